use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use sqlx::PgPool;

use super::ProductMirror;
use crate::error::{AppError, Result};
use crate::models::{MirroredProduct, ProductFields, ProductPatch, ProductRecord};

const COLUMNS: &str = "id, product_name, price, market_price, brand, seller, description, \
     manufacturing_date, expiry_date, listing_date, percentage_of_discount_offered, stock, \
     category, delivery_info, emi, images, user_id";

// Blank numeric input reads as zero.
fn parse_float(field: &str, value: &str) -> Result<f64> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0.0);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AppError::Validation(format!("{} must be a number, got '{}'", field, value)))
}

fn parse_count(field: &str, value: &str) -> Result<i32> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse::<i32>()
        .map_err(|_| AppError::Validation(format!("{} must be a whole number, got '{}'", field, value)))
}

// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp; blank means no date.
fn parse_date(field: &str, value: &str) -> Result<Option<NaiveDate>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(Some(date));
    }
    DateTime::parse_from_rfc3339(value)
        .map(|ts| Some(ts.date_naive()))
        .map_err(|_| AppError::Validation(format!("{} must be a date, got '{}'", field, value)))
}

fn opt<T>(value: Option<&String>, parse: impl Fn(&str) -> Result<T>) -> Result<Option<T>> {
    value.map(|v| parse(v.as_str())).transpose()
}

impl ProductRecord {
    pub fn coerce(id: &str, fields: &ProductFields) -> Result<Self> {
        Ok(ProductRecord {
            id: id.to_string(),
            product_name: fields.product_name.clone(),
            price: parse_float("price", &fields.price)?,
            market_price: parse_float("marketPrice", &fields.market_price)?,
            brand: fields.brand.clone(),
            seller: fields.seller.clone(),
            description: fields.description.clone(),
            manufacturing_date: parse_date("manufacturingDate", &fields.manufacturing_date)?,
            expiry_date: parse_date("expiryDate", &fields.expiry_date)?,
            listing_date: parse_date("listingDate", &fields.listing_date)?,
            percentage_of_discount_offered: parse_float(
                "percentageOfDiscountOffered",
                &fields.percentage_of_discount_offered,
            )?,
            stock: parse_count("stock", &fields.stock)?,
            category: fields.category.clone(),
            delivery_info: fields.delivery_info.clone(),
            emi: fields.emi.clone(),
            images: fields.images.clone(),
            user_id: fields.user_id.clone(),
        })
    }
}

/// A patch with its numeric and date fields already parsed.
#[derive(Debug, Default, PartialEq)]
pub struct CoercedPatch {
    pub price: Option<f64>,
    pub market_price: Option<f64>,
    pub percentage_of_discount_offered: Option<f64>,
    pub stock: Option<i32>,
    pub manufacturing_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub listing_date: Option<NaiveDate>,
}

impl CoercedPatch {
    pub fn from_patch(patch: &ProductPatch) -> Result<Self> {
        Ok(CoercedPatch {
            price: opt(patch.price.as_ref(), |v| parse_float("price", v))?,
            market_price: opt(patch.market_price.as_ref(), |v| parse_float("marketPrice", v))?,
            percentage_of_discount_offered: opt(patch.percentage_of_discount_offered.as_ref(), |v| {
                parse_float("percentageOfDiscountOffered", v)
            })?,
            stock: opt(patch.stock.as_ref(), |v| parse_count("stock", v))?,
            manufacturing_date: opt(patch.manufacturing_date.as_ref(), |v| {
                parse_date("manufacturingDate", v)
            })?
            .flatten(),
            expiry_date: opt(patch.expiry_date.as_ref(), |v| parse_date("expiryDate", v))?.flatten(),
            listing_date: opt(patch.listing_date.as_ref(), |v| parse_date("listingDate", v))?.flatten(),
        })
    }
}

/// The `products` table in PostgreSQL. Rows share their id with the
/// product document they mirror.
#[derive(Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        PgProductStore { pool }
    }
}

#[async_trait]
impl ProductMirror for PgProductStore {
    async fn create(&self, product: &MirroredProduct) -> Result<ProductRecord> {
        let record = ProductRecord::coerce(&product.document_id, &product.fields)?;
        let sql = format!(
            "INSERT INTO products ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING {COLUMNS}"
        );
        let stored = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(&record.id)
            .bind(&record.product_name)
            .bind(record.price)
            .bind(record.market_price)
            .bind(&record.brand)
            .bind(&record.seller)
            .bind(&record.description)
            .bind(record.manufacturing_date)
            .bind(record.expiry_date)
            .bind(record.listing_date)
            .bind(record.percentage_of_discount_offered)
            .bind(record.stock)
            .bind(&record.category)
            .bind(&record.delivery_info)
            .bind(&record.emi)
            .bind(&record.images)
            .bind(&record.user_id)
            .fetch_one(&self.pool)
            .await?;
        log::info!("Mirrored product {} into relational store", stored.id);
        Ok(stored)
    }

    async fn update(&self, id: &str, patch: &ProductPatch) -> Result<Option<ProductRecord>> {
        let coerced = CoercedPatch::from_patch(patch)?;
        let sql = format!(
            "UPDATE products SET \
               product_name = COALESCE($2, product_name), \
               price = COALESCE($3, price), \
               market_price = COALESCE($4, market_price), \
               brand = COALESCE($5, brand), \
               seller = COALESCE($6, seller), \
               description = COALESCE($7, description), \
               manufacturing_date = COALESCE($8, manufacturing_date), \
               expiry_date = COALESCE($9, expiry_date), \
               listing_date = COALESCE($10, listing_date), \
               percentage_of_discount_offered = COALESCE($11, percentage_of_discount_offered), \
               stock = COALESCE($12, stock), \
               category = COALESCE($13, category), \
               delivery_info = COALESCE($14, delivery_info), \
               emi = COALESCE($15, emi), \
               images = COALESCE($16, images) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(id)
            .bind(&patch.product_name)
            .bind(coerced.price)
            .bind(coerced.market_price)
            .bind(&patch.brand)
            .bind(&patch.seller)
            .bind(&patch.description)
            .bind(coerced.manufacturing_date)
            .bind(coerced.expiry_date)
            .bind(coerced.listing_date)
            .bind(coerced.percentage_of_discount_offered)
            .bind(coerced.stock)
            .bind(&patch.category)
            .bind(&patch.delivery_info)
            .bind(&patch.emi)
            .bind(&patch.images)
            .fetch_optional(&self.pool)
            .await?;
        Ok(updated)
    }
}

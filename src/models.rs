use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

// Form values arrive as strings or JSON numbers; both are kept as text.
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<Loose> for String {
    fn from(value: Loose) -> Self {
        match value {
            Loose::Text(s) => s,
            Loose::Int(i) => i.to_string(),
            Loose::Float(f) => f.to_string(),
        }
    }
}

fn free_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Option::<Loose>::deserialize(deserializer).map(|v| v.map(String::from).unwrap_or_default())
}

fn opt_free_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Option::<Loose>::deserialize(deserializer).map(|v| v.map(String::from))
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryFields {
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Category {
    pub id: String,
    #[serde(flatten)]
    pub fields: CategoryFields,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductFields {
    #[serde(default, deserialize_with = "free_text")]
    pub product_name: String,
    #[serde(default, deserialize_with = "free_text")]
    pub price: String,
    #[serde(default, deserialize_with = "free_text")]
    pub market_price: String,
    #[serde(default, deserialize_with = "free_text")]
    pub brand: String,
    #[serde(default, deserialize_with = "free_text")]
    pub seller: String,
    #[serde(default, deserialize_with = "free_text")]
    pub description: String,
    #[serde(default, deserialize_with = "free_text")]
    pub manufacturing_date: String,
    #[serde(default, deserialize_with = "free_text")]
    pub expiry_date: String,
    #[serde(default, deserialize_with = "free_text")]
    pub listing_date: String,
    #[serde(default, deserialize_with = "free_text")]
    pub percentage_of_discount_offered: String,
    #[serde(default, deserialize_with = "free_text")]
    pub stock: String,
    #[serde(default, deserialize_with = "free_text")]
    pub category: String,
    #[serde(default, deserialize_with = "free_text")]
    pub delivery_info: String,
    #[serde(default, deserialize_with = "free_text")]
    pub emi: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Form names of the editable product fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductField {
    ProductName,
    Price,
    MarketPrice,
    Brand,
    Seller,
    Description,
    ManufacturingDate,
    ExpiryDate,
    ListingDate,
    PercentageOfDiscountOffered,
    Stock,
    Category,
    DeliveryInfo,
    Emi,
}

impl std::str::FromStr for ProductField {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let field = match name {
            "productName" => ProductField::ProductName,
            "price" => ProductField::Price,
            "marketPrice" => ProductField::MarketPrice,
            "brand" => ProductField::Brand,
            "seller" => ProductField::Seller,
            "description" => ProductField::Description,
            "manufacturingDate" => ProductField::ManufacturingDate,
            "expiryDate" => ProductField::ExpiryDate,
            "listingDate" => ProductField::ListingDate,
            "percentageOfDiscountOffered" => ProductField::PercentageOfDiscountOffered,
            "stock" => ProductField::Stock,
            "category" => ProductField::Category,
            "deliveryInfo" => ProductField::DeliveryInfo,
            "emi" => ProductField::Emi,
            other => return Err(format!("unknown product field '{}'", other)),
        };
        Ok(field)
    }
}

impl ProductFields {
    /// A blank form: numeric fields start at zero and the listing date is today.
    pub fn blank(today: NaiveDate) -> Self {
        ProductFields {
            price: "0".into(),
            market_price: "0".into(),
            percentage_of_discount_offered: "0".into(),
            stock: "0".into(),
            listing_date: today.format("%Y-%m-%d").to_string(),
            ..Default::default()
        }
    }

    pub fn set(&mut self, field: ProductField, value: String) {
        let slot = match field {
            ProductField::ProductName => &mut self.product_name,
            ProductField::Price => &mut self.price,
            ProductField::MarketPrice => &mut self.market_price,
            ProductField::Brand => &mut self.brand,
            ProductField::Seller => &mut self.seller,
            ProductField::Description => &mut self.description,
            ProductField::ManufacturingDate => &mut self.manufacturing_date,
            ProductField::ExpiryDate => &mut self.expiry_date,
            ProductField::ListingDate => &mut self.listing_date,
            ProductField::PercentageOfDiscountOffered => &mut self.percentage_of_discount_offered,
            ProductField::Stock => &mut self.stock,
            ProductField::Category => &mut self.category,
            ProductField::DeliveryInfo => &mut self.delivery_info,
            ProductField::Emi => &mut self.emi,
        };
        *slot = value;
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Product {
    pub id: String,
    #[serde(flatten)]
    pub fields: ProductFields,
}

/// Partial product update. Absent fields are left untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(default, deserialize_with = "opt_free_text", skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(default, deserialize_with = "opt_free_text", skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, deserialize_with = "opt_free_text", skip_serializing_if = "Option::is_none")]
    pub market_price: Option<String>,
    #[serde(default, deserialize_with = "opt_free_text", skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "opt_free_text", skip_serializing_if = "Option::is_none")]
    pub seller: Option<String>,
    #[serde(default, deserialize_with = "opt_free_text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "opt_free_text", skip_serializing_if = "Option::is_none")]
    pub manufacturing_date: Option<String>,
    #[serde(default, deserialize_with = "opt_free_text", skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    #[serde(default, deserialize_with = "opt_free_text", skip_serializing_if = "Option::is_none")]
    pub listing_date: Option<String>,
    #[serde(default, deserialize_with = "opt_free_text", skip_serializing_if = "Option::is_none")]
    pub percentage_of_discount_offered: Option<String>,
    #[serde(default, deserialize_with = "opt_free_text", skip_serializing_if = "Option::is_none")]
    pub stock: Option<String>,
    #[serde(default, deserialize_with = "opt_free_text", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "opt_free_text", skip_serializing_if = "Option::is_none")]
    pub delivery_info: Option<String>,
    #[serde(default, deserialize_with = "opt_free_text", skip_serializing_if = "Option::is_none")]
    pub emi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        *self == ProductPatch::default()
    }

    pub fn apply(&self, fields: &mut ProductFields) {
        fn put(slot: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                slot.clone_from(v);
            }
        }
        put(&mut fields.product_name, &self.product_name);
        put(&mut fields.price, &self.price);
        put(&mut fields.market_price, &self.market_price);
        put(&mut fields.brand, &self.brand);
        put(&mut fields.seller, &self.seller);
        put(&mut fields.description, &self.description);
        put(&mut fields.manufacturing_date, &self.manufacturing_date);
        put(&mut fields.expiry_date, &self.expiry_date);
        put(&mut fields.listing_date, &self.listing_date);
        put(&mut fields.percentage_of_discount_offered, &self.percentage_of_discount_offered);
        put(&mut fields.stock, &self.stock);
        put(&mut fields.category, &self.category);
        put(&mut fields.delivery_info, &self.delivery_info);
        put(&mut fields.emi, &self.emi);
        if let Some(images) = &self.images {
            fields.images.clone_from(images);
        }
    }
}

// An edit form always sends every field.
impl From<&ProductFields> for ProductPatch {
    fn from(f: &ProductFields) -> Self {
        ProductPatch {
            product_name: Some(f.product_name.clone()),
            price: Some(f.price.clone()),
            market_price: Some(f.market_price.clone()),
            brand: Some(f.brand.clone()),
            seller: Some(f.seller.clone()),
            description: Some(f.description.clone()),
            manufacturing_date: Some(f.manufacturing_date.clone()),
            expiry_date: Some(f.expiry_date.clone()),
            listing_date: Some(f.listing_date.clone()),
            percentage_of_discount_offered: Some(f.percentage_of_discount_offered.clone()),
            stock: Some(f.stock.clone()),
            category: Some(f.category.clone()),
            delivery_info: Some(f.delivery_info.clone()),
            emi: Some(f.emi.clone()),
            images: Some(f.images.clone()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MirroredProduct {
    pub document_id: String,
    #[serde(flatten)]
    pub fields: ProductFields,
}

/// A product row in the relational mirror, after numeric and date coercion.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: String,
    pub product_name: String,
    pub price: f64,
    pub market_price: f64,
    pub brand: String,
    pub seller: String,
    pub description: String,
    pub manufacturing_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub listing_date: Option<NaiveDate>,
    pub percentage_of_discount_offered: f64,
    pub stock: i32,
    pub category: String,
    pub delivery_info: String,
    pub emi: String,
    pub images: Vec<String>,
    pub user_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub quantity: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub user_id: String,
    pub items: Vec<CartItem>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartInput {
    pub product_id: String,
    pub id_token: String,
}

/// An image as sent by a client: the file bytes are base64 encoded.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpload {
    pub file_name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    pub data: String,
}

#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProductSubmission {
    #[serde(flatten)]
    pub fields: ProductFields,
    #[serde(default)]
    pub uploads: Vec<ImageUpload>,
}

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::config::UpdateBackend;
use crate::error::{AppError, Result};
use crate::middleware::AuthMiddleware;
use crate::models::{AddToCartInput, CategoryFields, MirroredProduct, ProductPatch, ProductSubmission};
use crate::product_form::ProductForm;
use crate::session::{Identity, TokenKeys};
use crate::state::AppState;
use crate::storage::{decode_key, decode_uploads, is_product_image_key, ImageUploader};

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

async fn list_categories(state: web::Data<AppState>) -> Result<HttpResponse> {
    let categories = state.catalog.list_categories().await?;
    Ok(HttpResponse::Ok().json(categories))
}

async fn create_category(
    state: web::Data<AppState>,
    _identity: Identity,
    data: web::Json<CategoryFields>,
) -> Result<HttpResponse> {
    let id = state.catalog.create_category(data.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({ "message": "Category created", "id": id })))
}

async fn replace_category(
    state: web::Data<AppState>,
    _identity: Identity,
    id: web::Path<String>,
    data: web::Json<CategoryFields>,
) -> Result<HttpResponse> {
    let id = id.into_inner();
    match state.catalog.replace_category(&id, data.into_inner()).await? {
        Some(category) => Ok(HttpResponse::Ok().json(category)),
        None => Err(AppError::NotFound(format!("Category {} not found", id))),
    }
}

async fn delete_category(
    state: web::Data<AppState>,
    _identity: Identity,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let id = id.into_inner();
    if state.catalog.delete_category(&id).await? {
        Ok(HttpResponse::Ok().json(json!({ "message": "Category deleted successfully" })))
    } else {
        Err(AppError::NotFound(format!("Category {} not found", id)))
    }
}

async fn list_products(state: web::Data<AppState>) -> Result<HttpResponse> {
    let products = state.catalog.list_products().await?;
    Ok(HttpResponse::Ok().json(products))
}

async fn get_product(state: web::Data<AppState>, id: web::Path<String>) -> Result<HttpResponse> {
    let id = id.into_inner();
    match state.catalog.get_product(&id).await? {
        Some(product) => Ok(HttpResponse::Ok().json(product)),
        None => Err(AppError::NotFound(format!("Product {} not found", id))),
    }
}

async fn submit_product(
    state: web::Data<AppState>,
    identity: Identity,
    data: web::Json<ProductSubmission>,
) -> Result<HttpResponse> {
    let ProductSubmission { fields, uploads } = data.into_inner();
    let files = decode_uploads(uploads)?;

    let form = ProductForm::new(
        ImageUploader::new(state.storage.clone()),
        state.catalog.clone(),
        state.mirror.clone(),
    );
    form.fill(fields);
    form.upload_images(Some(&identity), files).await?;
    let submitted = form.submit(Some(&identity)).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Product added successfully!",
        "id": submitted.product_id,
        "images": submitted.images,
    })))
}

async fn create_mirrored_product(
    state: web::Data<AppState>,
    _identity: Identity,
    data: web::Json<MirroredProduct>,
) -> Result<HttpResponse> {
    let record = state.mirror.create(&data).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Product created successfully",
        "product": record,
    })))
}

async fn update_product(
    state: web::Data<AppState>,
    _identity: Identity,
    id: web::Path<String>,
    patch: web::Json<ProductPatch>,
) -> Result<HttpResponse> {
    let id = id.into_inner();
    let updated = match state.update_backend {
        UpdateBackend::Relational => state
            .mirror
            .update(&id, &patch)
            .await?
            .map(|record| json!(record)),
        UpdateBackend::Document => state
            .catalog
            .update_product(&id, &patch)
            .await?
            .map(|product| json!(product)),
    };
    match updated {
        Some(updated) => Ok(HttpResponse::Ok().json(json!({
            "message": "Product updated successfully",
            "updatedProduct": updated,
        }))),
        None => Err(AppError::NotFound(format!("Product {} not found", id))),
    }
}

async fn delete_product(
    state: web::Data<AppState>,
    _identity: Identity,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let id = id.into_inner();
    if state.catalog.delete_product(&id).await? {
        Ok(HttpResponse::Ok().json(json!({ "message": "Product deleted successfully" })))
    } else {
        Err(AppError::NotFound(format!("Product {} not found", id)))
    }
}

async fn add_to_cart(state: web::Data<AppState>, data: web::Json<AddToCartInput>) -> Result<HttpResponse> {
    let identity = state.tokens.verify(&data.id_token)?;
    if state.catalog.get_product(&data.product_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Product {} not found", data.product_id)));
    }
    let cart = state.carts.add_item(&identity.user_id, &data.product_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Product added to cart", "cart": cart })))
}

#[derive(Deserialize)]
struct MediaQuery {
    token: Option<String>,
}

async fn serve_media(
    state: web::Data<AppState>,
    key: web::Path<String>,
    query: web::Query<MediaQuery>,
) -> Result<HttpResponse> {
    let not_found = || AppError::NotFound("Object not found".into());
    let key = decode_key(&key)
        .filter(|key| is_product_image_key(key))
        .ok_or_else(not_found)?;
    let metadata = state.storage.metadata(&key).await?.ok_or_else(not_found)?;
    if metadata.download_token.is_none() || metadata.download_token != query.token {
        return Err(not_found());
    }
    let object = state.storage.get(&key).await?.ok_or_else(not_found)?;
    let content_type = object
        .metadata
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(HttpResponse::Ok().content_type(content_type).body(object.bytes))
}

pub fn configure(tokens: TokenKeys) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.route("/health", web::get().to(health))
            .route("/media/{key}", web::get().to(serve_media))
            .service(
                web::scope("/api")
                    .wrap(AuthMiddleware::new(tokens))
                    .route("/categories", web::get().to(list_categories))
                    .route("/categories", web::post().to(create_category))
                    .route("/categories/{id}", web::put().to(replace_category))
                    .route("/categories/{id}", web::delete().to(delete_category))
                    .route("/products", web::get().to(list_products))
                    .route("/products", web::post().to(submit_product))
                    .route("/products/create", web::post().to(create_mirrored_product))
                    .route("/products/{id}", web::get().to(get_product))
                    .route("/products/{id}", web::put().to(update_product))
                    .route("/products/{id}", web::delete().to(delete_product))
                    .route("/cart", web::post().to(add_to_cart)),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::encode_key;
    use crate::testing::{category, product, MemoryCarts, MemoryCatalog, MemoryMirror, MemoryStorage};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde_json::Value;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    struct Fixture {
        state: AppState,
        catalog: Arc<MemoryCatalog>,
        mirror: Arc<MemoryMirror>,
        storage: Arc<MemoryStorage>,
    }

    fn fixture(update_backend: UpdateBackend) -> Fixture {
        let catalog = Arc::new(MemoryCatalog::with(
            vec![category("c1", "Phones"), category("c2", "Laptops")],
            vec![product("p1", "Widget")],
        ));
        let mirror = Arc::new(MemoryMirror::default());
        let storage = Arc::new(MemoryStorage::default());
        let state = AppState {
            catalog: catalog.clone(),
            mirror: mirror.clone(),
            carts: Arc::new(MemoryCarts::default()),
            storage: storage.clone(),
            tokens: TokenKeys::new("test-secret", 60),
            update_backend,
        };
        Fixture {
            state,
            catalog,
            mirror,
            storage,
        }
    }

    fn bearer(state: &AppState, user: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", state.tokens.issue(user).unwrap()))
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state.clone()))
                    .configure(configure($state.tokens.clone())),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn lists_are_public() {
        let f = fixture(UpdateBackend::Relational);
        let app = app!(f.state);

        let req = test::TestRequest::get().uri("/api/categories").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["categoryName"], "Phones");

        let req = test::TestRequest::get().uri("/api/products/p1").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["id"], "p1");
        assert_eq!(body["productName"], "Widget");
    }

    #[actix_web::test]
    async fn missing_product_is_404() {
        let f = fixture(UpdateBackend::Relational);
        let app = app!(f.state);
        let req = test::TestRequest::get().uri("/api/products/nope").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn anonymous_submission_writes_nothing() {
        let f = fixture(UpdateBackend::Relational);
        let app = app!(f.state);

        let req = test::TestRequest::post()
            .uri("/api/products")
            .set_json(json!({ "productName": "Widget" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["redirect"], "/login");
        assert!(f.catalog.writes().is_empty());
    }

    #[actix_web::test]
    async fn bad_bearer_token_is_rejected() {
        let f = fixture(UpdateBackend::Relational);
        let app = app!(f.state);
        let req = test::TestRequest::get()
            .uri("/api/products")
            .insert_header(("Authorization", "Bearer not-a-jwt"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn submission_uploads_then_writes_both_stores() {
        let f = fixture(UpdateBackend::Relational);
        let app = app!(f.state);

        let req = test::TestRequest::post()
            .uri("/api/products")
            .insert_header(bearer(&f.state, "user-1"))
            .set_json(json!({
                "productName": "Widget",
                "price": 19.99,
                "stock": "4",
                "uploads": [
                    { "fileName": "front.png", "contentType": "image/png", "data": STANDARD.encode("front") },
                    { "fileName": "back.png", "data": STANDARD.encode("back") },
                ],
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;

        let id = body["id"].as_str().unwrap().to_string();
        assert_eq!(body["images"].as_array().unwrap().len(), 2);
        assert_eq!(f.mirror.created.lock()[0].document_id, id);
        assert_eq!(
            *f.storage.puts.lock(),
            vec!["products/user-1/front.png", "products/user-1/back.png"]
        );
        let products = f.catalog.products.lock();
        let stored = products.iter().find(|p| p.id == id).unwrap();
        assert_eq!(stored.fields.price, "19.99");
        assert_eq!(stored.fields.user_id.as_deref(), Some("user-1"));
    }

    #[actix_web::test]
    async fn mirror_failure_reports_the_saved_id() {
        let f = fixture(UpdateBackend::Relational);
        f.mirror.fail.store(true, Ordering::SeqCst);
        let app = app!(f.state);

        let req = test::TestRequest::post()
            .uri("/api/products")
            .insert_header(bearer(&f.state, "user-1"))
            .set_json(json!({ "productName": "Widget" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body: Value = test::read_body_json(resp).await;
        let id = body["productId"].as_str().unwrap();
        assert!(f.catalog.products.lock().iter().any(|p| p.id == id));
    }

    #[actix_web::test]
    async fn relational_update_coerces_fields() {
        let f = fixture(UpdateBackend::Relational);
        let app = app!(f.state);

        let req = test::TestRequest::post()
            .uri("/api/products/create")
            .insert_header(bearer(&f.state, "user-1"))
            .set_json(json!({ "documentId": "p1", "productName": "Widget", "price": "10" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

        let req = test::TestRequest::put()
            .uri("/api/products/p1")
            .insert_header(bearer(&f.state, "user-1"))
            .set_json(json!({ "price": "12.5", "stock": "3" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["updatedProduct"]["price"], 12.5);
        assert_eq!(body["updatedProduct"]["stock"], 3);
        assert!(f.catalog.writes().is_empty());

        let req = test::TestRequest::put()
            .uri("/api/products/p1")
            .insert_header(bearer(&f.state, "user-1"))
            .set_json(json!({ "stock": "lots" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn document_update_stores_text_as_sent() {
        let f = fixture(UpdateBackend::Document);
        let app = app!(f.state);

        let req = test::TestRequest::put()
            .uri("/api/products/p1")
            .insert_header(bearer(&f.state, "user-1"))
            .set_json(json!({ "stock": "lots" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["updatedProduct"]["stock"], "lots");
        assert_eq!(f.catalog.writes(), vec!["update_product:p1"]);
        assert!(f.mirror.updates.lock().is_empty());
    }

    #[actix_web::test]
    async fn category_replace_and_delete() {
        let f = fixture(UpdateBackend::Relational);
        let app = app!(f.state);

        let req = test::TestRequest::put()
            .uri("/api/categories/c1")
            .insert_header(bearer(&f.state, "admin"))
            .set_json(json!({ "categoryName": "Mobiles", "images": [] }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["categoryName"], "Mobiles");
        assert_eq!(body["images"], json!([]));

        let req = test::TestRequest::delete()
            .uri("/api/categories/c2")
            .insert_header(bearer(&f.state, "admin"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::delete()
            .uri("/api/categories/c2")
            .insert_header(bearer(&f.state, "admin"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(f.catalog.categories.lock().len(), 1);
    }

    #[actix_web::test]
    async fn cart_accepts_only_verified_tokens() {
        let f = fixture(UpdateBackend::Relational);
        let app = app!(f.state);

        let req = test::TestRequest::post()
            .uri("/api/cart")
            .set_json(json!({ "productId": "p1", "idToken": "forged" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let token = f.state.tokens.issue("user-1").unwrap();
        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/api/cart")
                .set_json(json!({ "productId": "p1", "idToken": token }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let req = test::TestRequest::post()
            .uri("/api/cart")
            .set_json(json!({ "productId": "p1", "idToken": token }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["cart"]["userId"], "user-1");
        assert_eq!(body["cart"]["items"][0]["quantity"], 3);

        let req = test::TestRequest::post()
            .uri("/api/cart")
            .set_json(json!({ "productId": "p404", "idToken": token }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn media_requires_the_download_token() {
        let f = fixture(UpdateBackend::Relational);
        let key = "products/user-1/a.png";
        f.state
            .storage
            .put(key, b"png".to_vec(), Some("image/png"))
            .await
            .unwrap();
        let token = f.storage.objects.lock()[key].metadata.download_token.clone().unwrap();
        let app = app!(f.state);

        let req = test::TestRequest::get()
            .uri(&format!("/media/{}?token={}", encode_key(key), token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type").unwrap(), "image/png");
        assert_eq!(test::read_body(resp).await.as_ref(), b"png");

        let req = test::TestRequest::get()
            .uri(&format!("/media/{}?token=guess", encode_key(key)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(*f.storage.reads.lock(), vec![key]);
    }

    #[actix_web::test]
    async fn media_outside_product_images_is_never_read() {
        let f = fixture(UpdateBackend::Relational);
        let app = app!(f.state);

        for key in ["/dev/zero", "/etc/hostname", "products/../../etc/passwd", "products/u1"] {
            let req = test::TestRequest::get()
                .uri(&format!("/media/{}", encode_key(key)))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
        }
        assert!(f.storage.reads.lock().is_empty());
    }
}

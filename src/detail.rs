//! Single-product view with the add-to-cart action.

use crate::client::CartService;
use crate::models::{Cart, Product};
use crate::session::SessionGuard;
use crate::store::CatalogStore;

pub const LOGIN_PATH: &str = "/login";
pub const CART_PATH: &str = "/Cart";

#[derive(Debug, Clone, PartialEq)]
pub enum DetailState {
    Loading,
    Found(Product),
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CartState {
    Idle,
    Pending,
    Added(Cart),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddToCart {
    RedirectToLogin(&'static str),
    /// Added; the caller may offer to navigate to the cart.
    Added { cart: Cart, cart_path: &'static str },
    Failed,
    /// No product is shown, so there is nothing to add.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
}

pub struct ProductDetail {
    product_id: String,
    state: DetailState,
    cart: CartState,
}

impl ProductDetail {
    pub fn new(product_id: impl Into<String>) -> Self {
        ProductDetail {
            product_id: product_id.into(),
            state: DetailState::Loading,
            cart: CartState::Idle,
        }
    }

    pub fn state(&self) -> &DetailState {
        &self.state
    }

    pub fn cart(&self) -> &CartState {
        &self.cart
    }

    /// Resolves the product. Store errors show the same as a missing product.
    pub async fn load(&mut self, store: &dyn CatalogStore) -> &DetailState {
        self.state = match store.get_product(&self.product_id).await {
            Ok(Some(product)) => DetailState::Found(product),
            Ok(None) => {
                log::warn!("Product {} not found", self.product_id);
                DetailState::NotFound
            }
            Err(e) => {
                log::error!("Error fetching product {}: {}", self.product_id, e);
                DetailState::NotFound
            }
        };
        &self.state
    }

    pub fn meta(&self) -> Option<PageMeta> {
        let DetailState::Found(product) = &self.state else {
            return None;
        };
        let name = &product.fields.product_name;
        Some(PageMeta {
            title: format!("{} - Product Details", name),
            description: format!(
                "Buy {} from our e-commerce platform. Explore product details, prices, and special offers.",
                name
            ),
        })
    }

    /// One attempt, no retry. Failures are logged and recorded in the cart state.
    pub async fn add_to_cart(
        &mut self,
        session: &dyn SessionGuard,
        carts: &dyn CartService,
    ) -> AddToCart {
        if !matches!(self.state, DetailState::Found(_)) {
            return AddToCart::Unavailable;
        }
        if session.current_user().is_none() {
            return AddToCart::RedirectToLogin(LOGIN_PATH);
        }

        self.cart = CartState::Pending;
        let result = match session.fresh_id_token().await {
            Ok(token) => carts.add_to_cart(&self.product_id, &token).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(cart) => {
                log::info!("Product {} added to cart", self.product_id);
                self.cart = CartState::Added(cart.clone());
                AddToCart::Added {
                    cart,
                    cart_path: CART_PATH,
                }
            }
            Err(e) => {
                log::error!("Error adding product {} to cart: {}", self.product_id, e);
                self.cart = CartState::Failed(e.to_string());
                AddToCart::Failed
            }
        }
    }
}

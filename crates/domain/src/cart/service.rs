use std::collections::HashMap;

use common::{CartId, ProductId, UserId};
use store::{CartLine, CartStore, ProductStore};

use super::{CartError, KeyGuard, KeyedLock, QuantityMethod};

/// Result of removing units from a cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The whole quantity was removed and the line is gone.
    Deleted(CartId),
    /// The line keeps its remaining quantity.
    Decremented(CartLine),
}

/// Service for managing cart lines.
///
/// Every mutation holds the owning user's lock for its full
/// read-modify-write sequence, so one user's lines are never mutated
/// concurrently. Lines of different users proceed in parallel.
///
/// Growing a line checks the product's current stock. Nothing is reserved
/// until checkout.
pub struct CartService<S: CartStore> {
    store: S,
    locks: KeyedLock<UserId>,
}

impl<S: CartStore + ProductStore> CartService<S> {
    /// Creates a new cart service with the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: KeyedLock::new(),
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Adds `quantity` of a product to the user's cart.
    ///
    /// Merges into the user's open line for the product if there is one.
    /// A quantity of zero counts as one. Fails with `ProductNotFound` for
    /// unknown products and `OutOfStock` when the line would hold more than
    /// is in stock.
    #[tracing::instrument(skip(self))]
    pub async fn add_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLine, CartError> {
        let quantity = quantity.max(1);
        let _guard = self.locks.lock(&user_id).await;
        self.ensure_available(user_id, product_id, quantity).await?;
        self.add_locked(user_id, product_id, quantity).await
    }

    /// Adds several products under a single acquisition of the user's lock.
    ///
    /// Every item is checked before anything is written, so a rejected item
    /// leaves the cart unchanged.
    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    pub async fn add_lines(
        &self,
        user_id: UserId,
        items: &[(ProductId, u32)],
    ) -> Result<Vec<CartLine>, CartError> {
        let _guard = self.locks.lock(&user_id).await;

        let mut adding: HashMap<ProductId, u32> = HashMap::with_capacity(items.len());
        for &(product_id, quantity) in items {
            let total = adding.entry(product_id).or_default();
            *total = total.saturating_add(quantity.max(1));
            self.ensure_available(user_id, product_id, *total).await?;
        }

        let mut lines = Vec::with_capacity(items.len());
        for &(product_id, quantity) in items {
            lines.push(self.add_locked(user_id, product_id, quantity.max(1)).await?);
        }
        Ok(lines)
    }

    /// Checks that the user's open line for the product can grow by
    /// `adding` units. Caller holds the user's lock.
    async fn ensure_available(
        &self,
        user_id: UserId,
        product_id: ProductId,
        adding: u32,
    ) -> Result<(), CartError> {
        let held = self
            .store
            .find_open_line(user_id, product_id)
            .await?
            .map_or(0, |line| line.quantity);
        self.ensure_stock(product_id, held.saturating_add(adding)).await
    }

    async fn ensure_stock(&self, product_id: ProductId, wanted: u32) -> Result<(), CartError> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound(product_id))?;
        if i64::from(wanted) > product.quantity {
            return Err(CartError::OutOfStock {
                product_id,
                available: product.quantity,
                requested: wanted,
            });
        }
        Ok(())
    }

    async fn add_locked(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLine, CartError> {
        let line = match self.store.find_open_line(user_id, product_id).await? {
            Some(existing) => {
                let merged = existing.quantity.saturating_add(quantity);
                self.store.set_quantity(existing.cart_id, merged).await?
            }
            None => self.store.insert_line(user_id, product_id, quantity).await?,
        };

        tracing::debug!(cart_id = %line.cart_id, quantity = line.quantity, "cart line added");
        Ok(line)
    }

    /// Adds to or subtracts from a line's quantity.
    ///
    /// Subtracting more than the line holds fails with `InvalidQuantity`
    /// and adding beyond stock fails with `OutOfStock`. Either way the line
    /// is left unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        cart_id: CartId,
        method: QuantityMethod,
        delta: u32,
    ) -> Result<CartLine, CartError> {
        let (line, _guard) = self.lock_line(cart_id).await?;

        let quantity = match method {
            QuantityMethod::Add => {
                let grown = line.quantity.saturating_add(delta);
                self.ensure_stock(line.product_id, grown).await?;
                grown
            }
            QuantityMethod::Subtract => {
                if line.quantity == 0 || delta > line.quantity {
                    return Err(CartError::InvalidQuantity {
                        requested: delta,
                        available: line.quantity,
                    });
                }
                line.quantity - delta
            }
        };

        Ok(self.store.set_quantity(cart_id, quantity).await?)
    }

    /// Removes `quantity` units from a line, deleting it when the whole
    /// quantity is removed.
    #[tracing::instrument(skip(self))]
    pub async fn remove_line(
        &self,
        cart_id: CartId,
        quantity: u32,
    ) -> Result<RemoveOutcome, CartError> {
        let (line, _guard) = self.lock_line(cart_id).await?;

        if quantity == 0 || quantity > line.quantity {
            return Err(CartError::InvalidQuantity {
                requested: quantity,
                available: line.quantity,
            });
        }

        if quantity == line.quantity {
            self.store.delete_line(cart_id).await?;
            tracing::debug!(%cart_id, "cart line deleted");
            return Ok(RemoveOutcome::Deleted(cart_id));
        }

        let line = self
            .store
            .set_quantity(cart_id, line.quantity - quantity)
            .await?;
        Ok(RemoveOutcome::Decremented(line))
    }

    /// Returns the user's open lines.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<Vec<CartLine>, CartError> {
        Ok(self.store.open_lines_for_user(user_id).await?)
    }

    /// Returns one open line of the user.
    #[tracing::instrument(skip(self))]
    pub async fn get_line(&self, user_id: UserId, cart_id: CartId) -> Result<CartLine, CartError> {
        match self.store.get_line(cart_id).await? {
            Some(line) if line.user_id == user_id && !line.processed => Ok(line),
            _ => Err(CartError::CartItemNotFound(cart_id)),
        }
    }

    /// Marks lines consumed by a checkout. Returns the number flipped.
    #[tracing::instrument(skip(self))]
    pub async fn mark_processed(
        &self,
        user_id: UserId,
        cart_ids: &[CartId],
    ) -> Result<u64, CartError> {
        let _guard = self.locks.lock(&user_id).await;
        Ok(self.store.mark_processed(user_id, cart_ids).await?)
    }

    /// Resolves the line's owner, takes the owner's lock and re-reads the
    /// line under it.
    async fn lock_line(
        &self,
        cart_id: CartId,
    ) -> Result<(CartLine, KeyGuard<UserId>), CartError> {
        let owner = self
            .open_line(cart_id)
            .await?
            .ok_or(CartError::CartItemNotFound(cart_id))?
            .user_id;

        let guard = self.locks.lock(&owner).await;
        let line = self
            .open_line(cart_id)
            .await?
            .ok_or(CartError::CartItemNotFound(cart_id))?;
        Ok((line, guard))
    }

    async fn open_line(&self, cart_id: CartId) -> Result<Option<CartLine>, CartError> {
        Ok(self
            .store
            .get_line(cart_id)
            .await?
            .filter(|line| !line.processed))
    }
}

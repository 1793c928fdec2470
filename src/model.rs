use crate::error::Result;
use async_trait::async_trait;
use std::ops::{Deref, DerefMut};
use tracing::{debug, info};

#[async_trait]
pub trait ModelHandle: Send + Sync {
    /// Human-readable model identifier used in logs and errors.
    fn model_name(&self) -> String;

    /// Acquire whatever the model needs to serve requests.
    async fn load(&mut self) -> Result<()>;

    /// Release everything acquired by `load`. Must be safe to call twice.
    fn unload(&mut self);

    fn is_loaded(&self) -> bool;
}

/// A loaded model that is unloaded when the guard goes out of scope,
/// including on early returns and panics.
pub struct Loaded<'a, M: ModelHandle + ?Sized> {
    model: &'a mut M,
}

impl<'a, M: ModelHandle + ?Sized> Loaded<'a, M> {
    /// Load `model` and wrap it. A failed load still triggers `unload`.
    pub async fn acquire(model: &'a mut M) -> Result<Self> {
        info!("Loading model: {}", model.model_name());
        if let Err(e) = model.load().await {
            model.unload();
            return Err(e);
        }
        debug!("Model ready: {}", model.model_name());
        Ok(Self { model })
    }
}

impl<M: ModelHandle + ?Sized> Deref for Loaded<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.model
    }
}

impl<M: ModelHandle + ?Sized> DerefMut for Loaded<'_, M> {
    fn deref_mut(&mut self) -> &mut M {
        self.model
    }
}

impl<M: ModelHandle + ?Sized> Drop for Loaded<'_, M> {
    fn drop(&mut self) {
        info!("Unloading model: {}", self.model.model_name());
        self.model.unload();
    }
}

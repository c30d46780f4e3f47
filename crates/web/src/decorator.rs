//! Handler transformers.
//!
//! A [`Decorator`] turns one value into another; in this crate it turns a
//! [`BoxHandler`](crate::BoxHandler) into a wrapping `BoxHandler`, which is what a
//! [`Middleware`](crate::middleware::Middleware) is.

use std::sync::Arc;

pub trait Decorator<In> {
    type Out;

    fn decorate(&self, raw: In) -> Self::Out;
}

impl<In, D: Decorator<In> + ?Sized> Decorator<In> for Arc<D> {
    type Out = D::Out;

    fn decorate(&self, raw: In) -> Self::Out {
        (**self).decorate(raw)
    }
}

//! The request handler seam.
//!
//! A [`Handler`] is called once per [`RequestContext`], in arrival order, and
//! is awaited before the next context is dispatched. It fills the response,
//! or streams it through [`RequestContext::start_streaming`], and may record
//! websocket upgrade intent.

use std::error::Error;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::protocol::RequestContext;

#[async_trait]
pub trait Handler: Send + Sync {
    type Error: Into<Box<dyn Error + Send + Sync>>;

    /// An `Err` is fatal to the connection: it is logged, answered with a 500
    /// and the connection closes after that write.
    async fn call(&self, ctx: &mut RequestContext) -> Result<(), Self::Error>;
}

/// Future returned by closures wrapped with [`make_handler`].
pub type HandlerFuture<'a, E> = Pin<Box<dyn Future<Output = Result<(), E>> + Send + 'a>>;

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F, Err> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut RequestContext) -> HandlerFuture<'a, Err> + Send + Sync,
    Err: Into<Box<dyn Error + Send + Sync>>,
{
    type Error = Err;

    async fn call(&self, ctx: &mut RequestContext) -> Result<(), Self::Error> {
        (self.f)(ctx).await
    }
}

/// Wraps a closure returning a boxed future as a [`Handler`].
///
/// ```
/// use micro_http_ws::handler::make_handler;
/// use micro_http_ws::protocol::RequestContext;
/// use std::convert::Infallible;
///
/// let handler = make_handler(|ctx: &mut RequestContext| {
///     Box::pin(async move {
///         ctx.response_mut().set_body("Hello World!\r\n");
///         Ok::<_, Infallible>(())
///     })
/// });
/// # let _ = handler;
/// ```
pub fn make_handler<F, Err>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a mut RequestContext) -> HandlerFuture<'a, Err>,
    Err: Into<Box<dyn Error + Send + Sync>>,
{
    HandlerFn { f }
}

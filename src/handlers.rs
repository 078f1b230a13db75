//! Built-in handlers bundling the behavior captured for stored values.
//!
//! A [`ValueHandler`] tells the storage engine how to perform the forwarded
//! domain action on a value and how to format it, without the engine ever
//! naming the value's type again. The handlers here cover the common cases;
//! implement [`ValueHandler`] directly for anything more exotic.

use polystore_internals::handlers::ValueHandler;

/// Trait for value types exposing a domain action through erased handles.
///
/// Storing a value with the [`Invoke`] handler forwards
/// [`Storage::invoke`](crate::Storage::invoke) to this trait's method. This
/// is the one piece of domain behavior a handle can trigger without knowing
/// the concrete type it stores.
///
/// # Examples
///
/// ```
/// use polystore::{Invokable, OnHeap, Storage};
///
/// #[derive(Clone, Debug)]
/// struct Bell;
///
/// impl Invokable for Bell {
///     fn invoke(&self) {
///         println!("ding");
///     }
/// }
///
/// let handle: Storage<OnHeap> = Storage::new(Bell);
/// handle.invoke(); // prints "ding"
/// ```
pub trait Invokable {
    /// Performs the domain action.
    fn invoke(&self);
}

/// Handler forwarding the domain action to the value's [`Invokable`] impl
/// and formatting through its [`Debug`](core::fmt::Debug) impl.
///
/// This is the default handler of the storage policies.
#[derive(Debug, Clone, Copy)]
pub struct Invoke;

impl<V> ValueHandler<V> for Invoke
where
    V: Invokable + core::fmt::Debug + 'static,
{
    fn invoke(value: &V) {
        Invokable::invoke(value);
    }

    fn debug(value: &V, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(value, formatter)
    }
}

/// Handler for values without a domain action.
///
/// Invoking a handle stored with this handler does nothing; formatting
/// goes through the value's [`Debug`](core::fmt::Debug) impl. Useful when a
/// store is only a container and the payloads are inspected by downcasting.
#[derive(Debug, Clone, Copy)]
pub struct Inert;

impl<V> ValueHandler<V> for Inert
where
    V: core::fmt::Debug + 'static,
{
    fn invoke(_value: &V) {}

    fn debug(value: &V, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(value, formatter)
    }
}

//! Handler trait defining the behavior captured for each stored value type.
//!
//! A handler bundles everything the storage engine needs to know about a
//! concrete value type beyond how to copy and destroy it: the single domain
//! action that erased handles forward to the value, and how the value is
//! formatted for debugging. The handler is captured in the vtable when a
//! slot is created and is dispatched to without knowing the concrete type.

/// Trait for implementing the behavior of a stored value type.
///
/// The handler type itself is never instantiated; it is a compile-time
/// strategy whose associated functions are baked into the vtable of every
/// slot created with it. This keeps the stored wrapper exactly one vtable
/// pointer plus the value, with no per-instance handler state.
///
/// # When to Implement
///
/// The `polystore` crate provides built-in handlers covering the common
/// cases (forwarding to a domain trait, or debug-formatting only).
/// Implement this trait directly when the forwarded action for a type
/// cannot be expressed through those, for example when one value type
/// must behave differently in different stores.
///
/// # Examples
///
/// ```
/// use polystore_internals::handlers::ValueHandler;
///
/// struct Greeter;
///
/// impl ValueHandler<String> for Greeter {
///     fn invoke(value: &String) {
///         println!("hello, {value}");
///     }
///
///     fn debug(value: &String, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
///         core::fmt::Debug::fmt(value, formatter)
///     }
/// }
/// ```
pub trait ValueHandler<V>: 'static {
    /// Performs the domain action on the value.
    ///
    /// This is the one operation erased handles forward to the concrete
    /// value without naming its type.
    fn invoke(value: &V);

    /// Formats the value using debug-style formatting.
    ///
    /// Called by the `Debug` implementations of the storage handles.
    fn debug(value: &V, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result;
}

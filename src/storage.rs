//! The erased value handle parameterized by a storage policy.

use core::any::TypeId;

use polystore_internals::{CapacityError, RawValueRef};

use crate::{
    policy::{Construct, Policy, TransferFrom},
    swap::SwapWith,
};

/// An owning handle to one type-erased value, stored according to policy
/// `P`.
///
/// The handle hides the concrete value type behind a vtable; the policy
/// decides where the value physically lives. Handles with different
/// policies share one API, and their payloads can be exchanged or moved
/// across policy boundaries.
///
/// A handle always holds a value. There is no empty or moved-from state:
/// moving a `Storage` moves the handle itself, and every constructor takes
/// a payload.
///
/// # Examples
///
/// ```
/// use polystore::{Invokable, OnHeap, OnStack, Storage};
///
/// #[derive(Clone, Debug)]
/// struct Greeting(&'static str);
///
/// impl Invokable for Greeting {
///     fn invoke(&self) {
///         println!("{}", self.0);
///     }
/// }
///
/// let mut boxed: Storage<OnHeap> = Storage::new(Greeting("from the heap"));
/// let mut inline: Storage<OnStack<_, 64>> = Storage::new(Greeting("from the buffer"));
///
/// boxed.invoke();
/// boxed.swap(&mut inline);
/// boxed.invoke(); // now prints "from the buffer"
/// ```
pub struct Storage<P: Policy> {
    /// The policy instance holding the value.
    policy: P,
}

impl<P: Policy> Storage<P> {
    /// Moves the value into a fresh handle.
    ///
    /// Where the value ends up is the policy's decision; see [`OnHeap`],
    /// [`OnStack`] and [`Hybrid`].
    ///
    /// [`OnHeap`]: crate::OnHeap
    /// [`OnStack`]: crate::OnStack
    /// [`Hybrid`]: crate::Hybrid
    pub fn new<V>(value: V) -> Self
    where
        P: Construct<V>,
    {
        Self {
            policy: P::construct(value),
        }
    }

    /// Whether the handle holds a value.
    ///
    /// Always true: handles have no empty state. The method exists for
    /// symmetry with nullable handle designs, so callers porting from one
    /// do not need an existence protocol of their own.
    #[must_use]
    pub fn has_value(&self) -> bool {
        true
    }

    /// Returns a borrowed erased view of the stored value.
    ///
    /// This is the escape hatch to the erased layer; everything else on
    /// this type goes through it.
    #[inline]
    pub fn as_raw(&self) -> RawValueRef<'_> {
        self.policy.as_raw()
    }

    /// The [`TypeId`] of the stored value.
    #[must_use]
    pub fn value_type_id(&self) -> TypeId {
        self.as_raw().value_type_id()
    }

    /// The type name of the stored value, for diagnostics.
    #[must_use]
    pub fn value_type_name(&self) -> &'static str {
        self.as_raw().value_type_name()
    }

    /// Returns a reference to the stored value if it is a `V`.
    #[must_use]
    pub fn downcast_ref<V: 'static>(&self) -> Option<&V> {
        self.as_raw().downcast_ref::<V>()
    }

    /// Returns a mutable reference to the stored value if it is a `V`.
    ///
    /// The value is edited in place wherever the policy keeps it; its type
    /// and placement do not change.
    #[must_use]
    pub fn downcast_mut<V: 'static>(&mut self) -> Option<&mut V> {
        self.policy.downcast_mut::<V>()
    }

    /// Performs the domain action captured when the value was stored.
    ///
    /// With the default [`Invoke`](crate::Invoke) handler this forwards to
    /// the value's [`Invokable`](crate::Invokable) impl.
    pub fn invoke(&self) {
        self.as_raw().invoke();
    }

    /// Borrows the underlying policy instance.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Borrows the underlying policy instance mutably.
    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// Unwraps the underlying policy instance.
    pub fn into_policy(self) -> P {
        self.policy
    }

    /// Wraps a policy instance in a handle.
    pub fn from_policy(policy: P) -> Self {
        Self { policy }
    }

    /// Exchanges the payloads with another handle, which may use a
    /// different policy, or fails without mutating either handle.
    ///
    /// # Errors
    ///
    /// Fails when one of the payloads does not fit the fixed-capacity
    /// buffer it would move into; see [`SwapWith`] for the full matrix.
    pub fn try_swap<Q>(&mut self, other: &mut Storage<Q>) -> Result<(), CapacityError>
    where
        Q: Policy,
        P: SwapWith<Q>,
    {
        self.policy.try_swap(&mut other.policy)
    }

    /// Exchanges the payloads with another handle, which may use a
    /// different policy.
    ///
    /// # Panics
    ///
    /// Panics when the exchange is infeasible; both handles are left
    /// untouched in that case. Use [`Storage::try_swap`] to handle
    /// infeasibility without panicking.
    pub fn swap<Q>(&mut self, other: &mut Storage<Q>)
    where
        Q: Policy,
        P: SwapWith<Q>,
    {
        crate::swap::swap(&mut self.policy, &mut other.policy);
    }

    /// Moves the payload into a handle of another policy.
    ///
    /// Available for the directions that cannot fail: everything fits on
    /// the heap, and everything fits a [`Hybrid`](crate::Hybrid).
    #[must_use]
    pub fn transfer<Q>(self) -> Storage<Q>
    where
        Q: Policy + From<P>,
    {
        Storage::from_policy(Q::from(self.policy))
    }

    /// Moves the payload into a handle of another policy, or returns the
    /// handle untouched if the payload does not fit there.
    ///
    /// # Errors
    ///
    /// Fails when the payload does not fit the target policy's buffer. The
    /// original handle is returned alongside the reason.
    pub fn try_transfer<Q>(self) -> Result<Storage<Q>, (Self, CapacityError)>
    where
        Q: TransferFrom<P>,
    {
        match Q::transfer_from(self.policy) {
            Ok(policy) => Ok(Storage::from_policy(policy)),
            Err((policy, err)) => Err((Self::from_policy(policy), err)),
        }
    }
}

impl<P: Policy + Clone> Clone for Storage<P> {
    /// Deep-clones the payload through its vtable.
    fn clone(&self) -> Self {
        Self::from_policy(self.policy.clone())
    }
}

impl<P: Policy> core::fmt::Debug for Storage<P> {
    /// Formats the stored value the way its handler prescribes.
    fn fmt(&self, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.as_raw().debug_value(formatter)
    }
}

#[cfg(test)]
mod tests {
    use alloc::{format, string::String};

    use super::*;
    use crate::{
        handlers::Inert,
        policy::{Hybrid, OnHeap, OnStack},
    };

    #[test]
    fn reports_the_stored_type() {
        let handle: Storage<OnHeap<Inert>> = Storage::new(7_u32);
        assert!(handle.has_value());
        assert_eq!(handle.value_type_id(), TypeId::of::<u32>());
        assert_eq!(handle.downcast_ref::<u32>(), Some(&7));
        assert_eq!(handle.downcast_ref::<u64>(), None);
    }

    #[test]
    fn downcast_mut_edits_the_payload_in_place() {
        let mut heap: Storage<OnHeap<Inert>> = Storage::new(String::from("heap"));
        heap.downcast_mut::<String>().unwrap().push('!');
        assert_eq!(heap.downcast_ref::<String>(), Some(&String::from("heap!")));

        let mut stack: Storage<OnStack<Inert, 64>> = Storage::new(7_u32);
        assert!(stack.downcast_mut::<u64>().is_none());
        *stack.downcast_mut::<u32>().unwrap() += 1;
        assert_eq!(stack.downcast_ref::<u32>(), Some(&8));

        let mut inline: Storage<Hybrid<Inert, 64>> = Storage::new(1_u32);
        *inline.downcast_mut::<u32>().unwrap() = 2;
        assert_eq!(inline.downcast_ref::<u32>(), Some(&2));

        let mut spilled: Storage<Hybrid<Inert, 32>> = Storage::new([3_u64; 8]);
        assert!(!spilled.policy().is_inline());
        spilled.downcast_mut::<[u64; 8]>().unwrap()[0] = 9;
        assert_eq!(
            spilled.downcast_ref::<[u64; 8]>(),
            Some(&[9, 3, 3, 3, 3, 3, 3, 3])
        );
    }

    #[test]
    fn debug_formats_through_the_handler() {
        let handle: Storage<OnStack<Inert, 64>> = Storage::new(String::from("shown"));
        assert_eq!(format!("{handle:?}"), "\"shown\"");
    }

    #[test]
    fn transfer_moves_between_policies() {
        let inline: Storage<OnStack<Inert, 64>> = Storage::new(String::from("move me"));
        let boxed: Storage<OnHeap<Inert>> = inline.transfer();
        assert_eq!(boxed.downcast_ref::<String>(), Some(&String::from("move me")));

        let hybrid: Storage<Hybrid<Inert, 64>> = boxed.transfer();
        assert!(hybrid.policy().is_inline());
        assert_eq!(
            hybrid.downcast_ref::<String>(),
            Some(&String::from("move me"))
        );
    }

    #[test]
    fn handles_are_single_threaded() {
        static_assertions::assert_not_impl_any!(Storage<OnHeap<Inert>>: Send, Sync);
        static_assertions::assert_not_impl_any!(Storage<OnStack<Inert, 64>>: Send, Sync);
        static_assertions::assert_not_impl_any!(Storage<Hybrid<Inert, 64>>: Send, Sync);
    }

    #[test]
    fn failed_transfer_returns_the_handle() {
        let boxed: Storage<OnHeap<Inert>> = Storage::new([1_u64; 32]);
        let (boxed, err) = boxed.try_transfer::<OnStack<Inert, 64>>().unwrap_err();
        assert_eq!(err.capacity(), 64);
        assert_eq!(boxed.downcast_ref::<[u64; 32]>(), Some(&[1; 32]));
    }
}

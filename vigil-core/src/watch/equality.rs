//! Change detection.
//!
//! Watchers compare with "same value" semantics: `PartialEq`, except that two
//! values which are each unequal to themselves (NaN) count as the same.

/// Whether `value` compares unequal to itself.
#[allow(clippy::eq_op)]
fn is_self_unequal<T: PartialEq + ?Sized>(value: &T) -> bool {
    value != value
}

/// Whether `new` should count as a change from `old`.
///
/// ```rust
/// use vigil_core::watch::has_changed;
///
/// assert!(has_changed(&1, &2));
/// assert!(!has_changed(&1, &1));
/// assert!(!has_changed(&f64::NAN, &f64::NAN));
/// assert!(has_changed(&f64::NAN, &1.0));
/// ```
pub fn has_changed<T: PartialEq + ?Sized>(new: &T, old: &T) -> bool {
    new != old && !(is_self_unequal(new) && is_self_unequal(old))
}

/// Element-wise [`has_changed`] for sequence sources.
#[allow(clippy::ptr_arg)]
pub fn any_changed<T: PartialEq>(new: &Vec<T>, old: &Vec<T>) -> bool {
    new.len() != old.len() || new.iter().zip(old).any(|(n, o)| has_changed(n, o))
}

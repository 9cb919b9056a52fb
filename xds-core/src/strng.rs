//! Cheaply cloneable, reference-counted string type used throughout the
//! control plane for node IDs, resource names, and other values that are
//! read far more often than they are constructed.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

pub type Strng = arcstr::ArcStr;

/// Build a [`Strng`] from anything that can be turned into one, without an
/// extra allocation when the input is already an `ArcStr`.
pub fn new(s: impl AsRef<str>) -> Strng {
	Strng::from(s.as_ref())
}

/// Marker trait for types that behave like a borrowed string, used to keep
/// call sites generic over `&str` / `String` / `Strng` inputs.
pub trait RichStrng: Deref<Target = str> + Borrow<str> + fmt::Display {}
impl<T> RichStrng for T where T: Deref<Target = str> + Borrow<str> + fmt::Display {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_roundtrips() {
		let s = new("hello");
		assert_eq!(s.as_str(), "hello");
		let s2 = s.clone();
		assert_eq!(s, s2);
	}
}

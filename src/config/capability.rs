//! Settable leaf slots.
//!
//! A [`Slot`] is the settable reference handed to a field visitor. Which slot
//! wraps a field is decided by `#[derive(Configurable)]` at compile time: a
//! field marked with a parsing capability (`setter`, `from_str`,
//! `from_bytes`) gets that capability's slot and never reaches kind-based
//! coercion; every other leaf gets a [`KindSlot`].

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use super::coerce::{short_type_name, BoxError, Coerce, CoerceError};

/// A settable configuration leaf.
pub trait Slot {
    /// Parses `raw` and stores the result.
    fn assign(&mut self, raw: &str) -> Result<(), CoerceError>;

    /// Type name shown in usage output and parse errors.
    fn type_name(&self) -> Cow<'static, str>;

    /// Current value, for diagnostics.
    fn render(&self) -> String;
}

/// In-place parsing capability, for types that update themselves from a raw
/// string rather than being constructed from one.
pub trait Setter {
    fn set(&mut self, raw: &str) -> Result<(), BoxError>;
}

/// Kind-dispatched leaf backed by [`Coerce`].
pub struct KindSlot<'a, T>(pub &'a mut T);

impl<T: Coerce + fmt::Debug> Slot for KindSlot<'_, T> {
    fn assign(&mut self, raw: &str) -> Result<(), CoerceError> {
        *self.0 = T::coerce(raw)?;
        Ok(())
    }

    fn type_name(&self) -> Cow<'static, str> {
        T::type_name()
    }

    fn render(&self) -> String {
        format!("{:?}", self.0)
    }
}

/// Leaf backed by [`Setter`].
pub struct SetterSlot<'a, T>(pub &'a mut T);

impl<T: Setter + fmt::Debug> Slot for SetterSlot<'_, T> {
    fn assign(&mut self, raw: &str) -> Result<(), CoerceError> {
        self.0.set(raw).map_err(CoerceError::Custom)
    }

    fn type_name(&self) -> Cow<'static, str> {
        Cow::Owned(short_type_name(std::any::type_name::<T>()))
    }

    fn render(&self) -> String {
        format!("{:?}", self.0)
    }
}

/// Leaf parsed from text through [`FromStr`].
pub struct TextSlot<'a, T>(pub &'a mut T);

impl<T> Slot for TextSlot<'_, T>
where
    T: FromStr + fmt::Debug,
    T::Err: Into<BoxError>,
{
    fn assign(&mut self, raw: &str) -> Result<(), CoerceError> {
        *self.0 = raw.parse().map_err(|err: T::Err| CoerceError::Custom(err.into()))?;
        Ok(())
    }

    fn type_name(&self) -> Cow<'static, str> {
        Cow::Owned(short_type_name(std::any::type_name::<T>()))
    }

    fn render(&self) -> String {
        format!("{:?}", self.0)
    }
}

/// Leaf decoded from the raw string's bytes through `TryFrom<&[u8]>`.
pub struct BinarySlot<'a, T>(pub &'a mut T);

impl<T> Slot for BinarySlot<'_, T>
where
    T: for<'b> TryFrom<&'b [u8]> + fmt::Debug,
    for<'b> <T as TryFrom<&'b [u8]>>::Error: Into<BoxError>,
{
    fn assign(&mut self, raw: &str) -> Result<(), CoerceError> {
        *self.0 = T::try_from(raw.as_bytes()).map_err(|err| CoerceError::Custom(err.into()))?;
        Ok(())
    }

    fn type_name(&self) -> Cow<'static, str> {
        Cow::Owned(short_type_name(std::any::type_name::<T>()))
    }

    fn render(&self) -> String {
        format!("{:?}", self.0)
    }
}

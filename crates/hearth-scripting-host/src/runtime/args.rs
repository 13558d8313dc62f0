//! Argument forwarding between host code and script handlers.
//!
//! Event arguments are an ordered list of host values. The dispatcher never
//! looks at their layout: each runtime implements [`ArgVisitor`] to turn
//! `serde::Serialize` values into its own values, and receives them in
//! declaration order.

use serde::Serialize;

use crate::error::ScriptError;

/// Receives event arguments one at a time, in declaration order.
pub trait ArgVisitor {
    fn visit<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ScriptError>;
}

/// An ordered list of host values that can be forwarded to a handler.
///
/// Implemented for tuples of up to eight serializable values, for slices and
/// `Vec`s (one argument per element) and for references to any of these.
pub trait ScriptArgs {
    fn forward<V: ArgVisitor>(&self, visitor: &mut V) -> Result<(), ScriptError>;
}

impl<T: ScriptArgs + ?Sized> ScriptArgs for &T {
    fn forward<V: ArgVisitor>(&self, visitor: &mut V) -> Result<(), ScriptError> {
        (**self).forward(visitor)
    }
}

impl<T: Serialize> ScriptArgs for [T] {
    fn forward<V: ArgVisitor>(&self, visitor: &mut V) -> Result<(), ScriptError> {
        for value in self {
            visitor.visit(value)?;
        }
        Ok(())
    }
}

impl<T: Serialize> ScriptArgs for Vec<T> {
    fn forward<V: ArgVisitor>(&self, visitor: &mut V) -> Result<(), ScriptError> {
        self.as_slice().forward(visitor)
    }
}

macro_rules! impl_script_args_for_tuple {
    ($($arg:ident),*) => {
        impl<$($arg: Serialize),*> ScriptArgs for ($($arg,)*) {
            #[allow(non_snake_case, unused_variables)]
            fn forward<V: ArgVisitor>(&self, visitor: &mut V) -> Result<(), ScriptError> {
                let ($($arg,)*) = self;
                $(visitor.visit($arg)?;)*
                Ok(())
            }
        }
    };
}

impl_script_args_for_tuple!();
impl_script_args_for_tuple!(A);
impl_script_args_for_tuple!(A, B);
impl_script_args_for_tuple!(A, B, C);
impl_script_args_for_tuple!(A, B, C, D);
impl_script_args_for_tuple!(A, B, C, D, E);
impl_script_args_for_tuple!(A, B, C, D, E, F);
impl_script_args_for_tuple!(A, B, C, D, E, F, G);
impl_script_args_for_tuple!(A, B, C, D, E, F, G, H);

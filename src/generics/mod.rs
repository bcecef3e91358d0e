//! Generic parameters, argument lists and the instantiation caches.
//!
//! Generic parameters may be mentioned by position (`!0`, `!!1`) or by name (`!T`, `!!U`).
//! By-name mentions depend on where they appear, so they are never memoized as-is: before a
//! type or member that contains them is resolved, [`GenericsEngine::bind_type`] rewrites them
//! to the positional form using the [`GenericScope`] in effect (type-level names for `!`,
//! method-level names for `!!`).
//!
//! Instantiations are canonicalized by [`GenericsEngine`]: one cache per open type and one per
//! open method, each keyed by [`GenericArguments::signature`].

mod instantiation;
mod params;

pub use instantiation::{GenericArguments, GenericsEngine};
pub use params::{
    GenericParamKind, GenericParamRef, GenericParameter, GenericParameters, GenericScope,
    ParamBinding,
};

//! Data model and identity calculation for content-addressed build recipes
//! ("derivations"), compatible with the formats used by C++ Nix.
//!
//! The crate provides:
//!
//!  - the [derivation::Derivation] struct, its canonical ATerm
//!    serialization and parser,
//!  - `hashDerivationModulo`, the recursive, memoized identity hash that is
//!    invariant under irrelevant changes in fixed-output dependency subtrees,
//!  - placeholder calculation and dependency resolution
//!    ([derivation::Derivation::try_resolve]),
//!  - the [store::Store] trait describing the capabilities the above needs
//!    from a store implementation.

pub(crate) mod aterm;
pub mod derivation;
pub mod nixbase32;
pub mod nixhash;
pub mod store;
pub mod store_path;

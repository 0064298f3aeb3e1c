//! # Stats
//!
//! $$
//! \mathcal R(X,Y)=0 \iff X \perp Y
//! $$
//!
pub mod dcor;

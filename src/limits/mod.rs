//! Hard numeric risk limits — the layer no upstream decision-maker,
//! including an LLM, can override.

pub mod policy;
pub mod validator;

pub use policy::LimitPolicy;
pub use validator::{LimitValidator, ViolationKind, ViolationStats};

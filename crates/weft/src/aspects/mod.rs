//! Join points, pointcuts, advice and aspects

pub mod advice;
pub mod aspect;
pub mod join_point;
pub mod pointcut;

pub use advice::{Advice, AdviceChain, AdviceContext, AdviceFn, AdviceKind, AdviceNode};
pub use aspect::Aspect;
pub use join_point::JoinPoint;
pub use pointcut::Pointcut;

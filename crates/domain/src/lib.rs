//! 语言学习聊天系统核心领域模型
//!
//! 包含消息实体、值对象，以及入站负载的校验规则。

pub mod errors;
pub mod message;
pub mod value_objects;

// 重新导出常用类型
pub use errors::*;
pub use message::*;
pub use value_objects::*;

//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 把一次合并请求串起来：读输入 → 生成指令 → 原位替换或兜底 → 写出文档。
//!
//! ## 层次关系
//!
//! ```text
//! merge_processor (处理一次 Base CP + Recap)
//!     ↓
//! services (能力层：extract / generate / apply / fallback)
//!     ↓
//! clients + document (基础设施：HTTP 往返、DOCX 读写)
//! ```
//!
//! ## 设计原则
//!
//! 1. **无业务逻辑**：只做调度和状态记录
//! 2. **资源隔离**：每次请求独占自己的文档实例
//! 3. **向下依赖**：编排层 → services → clients / document

pub mod merge_processor;

pub use merge_processor::{
    process_documents, InputCleanup, MergeMode, MergeOutcome, MergeProcessor, MergeState,
};

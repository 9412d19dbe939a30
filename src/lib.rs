//! # Smart CP
//!
//! 根据 Recap（租船确认书）更新 Base Charter Party（租船合同底稿）的 Rust 库
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `document/` - 持有 DOCX 文档，只暴露段落 / 表格 / Run 的读写
//! - `clients/` - 文本生成服务的 HTTP 往返
//!
//! ### ② 数据模型（Models）
//! - `ReplacementInstruction` / `InstructionSet` - 替换指令
//!
//! ### ③ 业务能力层（Services）
//! - `normalizer` / `run_rewriter` - 文本归一化、保留格式的段落内替换
//! - `replacement_service` - 整份文档的替换
//! - `InstructionGenerator` - 生成替换指令（带重试）
//! - `fallback_composer` - 兜底文档
//! - `text_extractor` - 读取 DOCX / PDF 文本
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/merge_processor` - 一次合并请求的状态流转
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod document;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use config::Config;
pub use document::Document;
pub use error::{AppError, AppResult};
pub use models::{InstructionSet, ReplacementInstruction};
pub use orchestrator::{process_documents, MergeMode, MergeOutcome, MergeProcessor};
pub use services::InstructionGenerator;

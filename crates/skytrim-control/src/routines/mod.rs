//! 修正例程
//!
//! 每个例程读取快照与设定值，只通过 [`TrimAnchor::nudge`](skytrim_core::TrimAnchor::nudge)
//! 对锚点做有界增量，并返回本周期各修正分项（用于日志与测试）。
//! I/O 写入由引擎完成；自动起飞例外，它直接驱动油门、方向舵与升降舵。

pub mod acrobatic;
pub mod level;
pub mod takeoff;
pub mod vertical;
pub mod waypoint;

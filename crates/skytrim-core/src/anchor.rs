//! 配平锚点（积分项）
//!
//! 修正例程每个周期只对锚点做有界增量 [`TrimAnchor::nudge`]。
//! 绝对赋值（[`TrimAnchor::seed`]）只允许在模式切换时使用，且同样受 `range` 约束。

use crate::math::constrain;
use serde::{Deserialize, Serialize};

/// 配平轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// 副翼（滚转）
    Aileron,
    /// 升降舵（俯仰）
    Elevator,
}

/// 单轴限幅
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisBounds {
    /// 单次增量上限（绝对值）
    pub max_step: f64,
    /// 锚点取值范围 `[-range, range]`
    pub range: f64,
}

impl AxisBounds {
    pub const fn new(max_step: f64, range: f64) -> Self {
        Self { max_step, range }
    }
}

/// 两轴配平锚点
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrimAnchor {
    pub aileron: f64,
    pub elevator: f64,
}

impl TrimAnchor {
    pub const fn new(aileron: f64, elevator: f64) -> Self {
        Self { aileron, elevator }
    }

    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Aileron => self.aileron,
            Axis::Elevator => self.elevator,
        }
    }

    fn slot(&mut self, axis: Axis) -> &mut f64 {
        match axis {
            Axis::Aileron => &mut self.aileron,
            Axis::Elevator => &mut self.elevator,
        }
    }

    /// 有界增量
    ///
    /// 增量先钳位到 `±max_step`，结果再钳位到 `±range`。
    /// 返回实际生效的增量。
    pub fn nudge(&mut self, axis: Axis, delta: f64, bounds: AxisBounds) -> f64 {
        let step = constrain(delta, -bounds.max_step, bounds.max_step);
        let slot = self.slot(axis);
        let before = *slot;
        *slot = constrain(before + step, -bounds.range, bounds.range);
        *slot - before
    }

    /// 模式切换时为单轴设定初值（例如接通 LVL 时吸收当前手动配平）
    pub fn seed(&mut self, axis: Axis, value: f64, bounds: AxisBounds) {
        *self.slot(axis) = constrain(value, -bounds.range, bounds.range);
    }
}

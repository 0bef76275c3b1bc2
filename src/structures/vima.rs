use burn::tensor::{backend::Backend, Int, Tensor};
use serde::{Deserialize, Serialize};

use super::keys::{PerPoseAction, PerView};

pub const N_DISCRETE_X_BINS: i64 = 50;
pub const N_DISCRETE_Y_BINS: i64 = 100;
pub const N_DISCRETE_ROT_BINS: i64 = 50;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    VisualManipulation,
    SceneUnderstanding,
    Rotate,
    Rearrange,
    RearrangeThenRestore,
    NovelAdjAndNoun,
    NovelAdj,
    NovelNoun,
    Twist,
    FollowMotion,
    FollowOrder,
    SweepWithoutExceeding,
    SweepWithoutTouching,
    SameTexture,
    SameShape,
    ManipulateOldNeighbor,
    PickInOrderThenRestore,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::VisualManipulation => "visual_manipulation",
            Task::SceneUnderstanding => "scene_understanding",
            Task::Rotate => "rotate",
            Task::Rearrange => "rearrange",
            Task::RearrangeThenRestore => "rearrange_then_restore",
            Task::NovelAdjAndNoun => "novel_adj_and_noun",
            Task::NovelAdj => "novel_adj",
            Task::NovelNoun => "novel_noun",
            Task::Twist => "twist",
            Task::FollowMotion => "follow_motion",
            Task::FollowOrder => "follow_order",
            Task::SweepWithoutExceeding => "sweep_without_exceeding",
            Task::SweepWithoutTouching => "sweep_without_touching",
            Task::SameTexture => "same_texture",
            Task::SameShape => "same_shape",
            Task::ManipulateOldNeighbor => "manipulate_old_neighbor",
            Task::PickInOrderThenRestore => "pick_in_order_then_restore",
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single action taken by the agent, as continuous pose tensors.
#[derive(Clone, Debug)]
pub struct PoseAction<B: Backend> {
    pub index: usize,
    pub pose0_position: Tensor<B, 1>, // [2]
    pub pose1_position: Tensor<B, 1>, // [2]
    pub pose0_rotation: Tensor<B, 1>, // [4]
    pub pose1_rotation: Tensor<B, 1>, // [4]
}

impl<B: Backend> PoseAction<B> {
    pub fn from_pose_tensors(index: usize, poses: PerPoseAction<Tensor<B, 1>>) -> Self {
        Self {
            index,
            pose0_position: poses.pose0_position,
            pose1_position: poses.pose1_position,
            pose0_rotation: poses.pose0_rotation,
            pose1_rotation: poses.pose1_rotation,
        }
    }

    pub fn to_pose_tensors(&self) -> PerPoseAction<Tensor<B, 1>> {
        PerPoseAction {
            pose0_position: self.pose0_position.clone(),
            pose1_position: self.pose1_position.clone(),
            pose0_rotation: self.pose0_rotation.clone(),
            pose1_rotation: self.pose1_rotation.clone(),
        }
    }
}

/// Raw sensor readings for one environment step.
#[derive(Clone, Debug)]
pub struct Observation<B: Backend> {
    pub index: usize,
    pub rgb: PerView<Tensor<B, 3, Int>>,  // [C, H, W]
    pub segm: PerView<Tensor<B, 2, Int>>, // [H, W]
    pub end_effector: Tensor<B, 1>,       // [D_ee]
}

/// The trajectory of one finished (or interrupted) episode.
#[derive(Clone, Debug)]
pub struct EpisodeRecord<B: Backend> {
    pub observations: Vec<Observation<B>>,
    pub pose_actions: Vec<PoseAction<B>>,
    pub total_steps: usize,
    pub is_successful_at_end: bool,
    pub success_per_step: Vec<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::value::{Error as ValueError, StrDeserializer};
    use serde::de::IntoDeserializer;

    #[test]
    fn task_names_match_their_serde_names() {
        let tasks = [
            Task::VisualManipulation,
            Task::SceneUnderstanding,
            Task::Rotate,
            Task::Rearrange,
            Task::RearrangeThenRestore,
            Task::NovelAdjAndNoun,
            Task::NovelAdj,
            Task::NovelNoun,
            Task::Twist,
            Task::FollowMotion,
            Task::FollowOrder,
            Task::SweepWithoutExceeding,
            Task::SweepWithoutTouching,
            Task::SameTexture,
            Task::SameShape,
            Task::ManipulateOldNeighbor,
            Task::PickInOrderThenRestore,
        ];

        for task in tasks {
            let deserializer: StrDeserializer<ValueError> = task.as_str().into_deserializer();
            assert_eq!(Task::deserialize(deserializer), Ok(task));
            assert_eq!(task.to_string(), task.as_str());
        }
    }
}

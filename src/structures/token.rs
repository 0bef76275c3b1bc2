use burn::tensor::{backend::Backend, Int, Tensor};
use serde::{Deserialize, Serialize};

use super::keys::PerPoseAction;
use super::vima::{N_DISCRETE_ROT_BINS, N_DISCRETE_X_BINS, N_DISCRETE_Y_BINS};
use crate::error::TokenError;

/// Different modalities that can be encoded.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Text,
    Image,
    EndEffector,
    Observation,
    Action,
}

/// Discretised pose action, ready to be used as a target.
#[derive(Clone, Debug)]
pub struct PoseActionToken<B: Backend> {
    pub index: usize,
    pub pose0_position: Tensor<B, 1, Int>,
    pub pose1_position: Tensor<B, 1, Int>,
    pub pose0_rotation: Tensor<B, 1, Int>,
    pub pose1_rotation: Tensor<B, 1, Int>,
}

impl<B: Backend> PoseActionToken<B> {
    pub fn token_type(&self) -> TokenType {
        TokenType::Action
    }

    pub fn from_pose_action(
        index: usize,
        pose_action: PerPoseAction<Tensor<B, 1, Int>>,
    ) -> Result<Self, TokenError> {
        check_position(&pose_action.pose0_position)?;
        check_position(&pose_action.pose1_position)?;
        check_rotation(&pose_action.pose0_rotation)?;
        check_rotation(&pose_action.pose1_rotation)?;

        Ok(Self {
            index,
            pose0_position: pose_action.pose0_position,
            pose1_position: pose_action.pose1_position,
            pose0_rotation: pose_action.pose0_rotation,
            pose1_rotation: pose_action.pose1_rotation,
        })
    }

    pub fn to_target_pose_action(&self) -> PerPoseAction<Tensor<B, 1, Int>> {
        PerPoseAction {
            pose0_position: self.pose0_position.clone(),
            pose1_position: self.pose1_position.clone(),
            pose0_rotation: self.pose0_rotation.clone(),
            pose1_rotation: self.pose1_rotation.clone(),
        }
    }
}

fn values<B: Backend>(tensor: &Tensor<B, 1, Int>) -> Vec<i64> {
    tensor.to_data().convert::<i64>().value
}

// Positions are [x, y]
fn check_position<B: Backend>(tensor: &Tensor<B, 1, Int>) -> Result<(), TokenError> {
    let values = values(tensor);
    let in_range = values.len() >= 2
        && values[0] < N_DISCRETE_X_BINS
        && values[1] < N_DISCRETE_Y_BINS
        && values.iter().all(|v| *v >= 0);

    if in_range {
        Ok(())
    } else {
        Err(TokenError::PositionOutOfRange {
            values,
            x_bins: N_DISCRETE_X_BINS,
            y_bins: N_DISCRETE_Y_BINS,
        })
    }
}

fn check_rotation<B: Backend>(tensor: &Tensor<B, 1, Int>) -> Result<(), TokenError> {
    let values = values(tensor);
    if values.iter().all(|v| (0..N_DISCRETE_ROT_BINS).contains(v)) {
        Ok(())
    } else {
        Err(TokenError::RotationOutOfRange {
            values,
            rot_bins: N_DISCRETE_ROT_BINS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn pose(
        position: [i32; 2],
        rotation: [i32; 4],
    ) -> PerPoseAction<Tensor<TestBackend, 1, Int>> {
        PerPoseAction {
            pose0_position: Tensor::from_ints(position),
            pose1_position: Tensor::from_ints(position),
            pose0_rotation: Tensor::from_ints(rotation),
            pose1_rotation: Tensor::from_ints(rotation),
        }
    }

    #[test]
    fn valid_pose_action_becomes_token() {
        let token = PoseActionToken::from_pose_action(3, pose([49, 99], [0, 1, 2, 49])).unwrap();

        assert_eq!(token.index, 3);
        assert_eq!(token.token_type(), TokenType::Action);
        let target = token.to_target_pose_action();
        assert_eq!(target.pose1_position.into_data().value, vec![49, 99]);
    }

    #[test]
    fn x_position_must_be_below_x_bins() {
        let err = PoseActionToken::from_pose_action(0, pose([50, 10], [0, 0, 0, 0])).unwrap_err();

        assert!(matches!(err, TokenError::PositionOutOfRange { .. }));
    }

    #[test]
    fn y_position_may_exceed_x_bins() {
        let token = PoseActionToken::from_pose_action(0, pose([10, 75], [0, 0, 0, 0]));

        assert!(token.is_ok());
    }

    #[test]
    fn negative_rotation_is_rejected() {
        let err = PoseActionToken::from_pose_action(0, pose([1, 1], [0, -1, 0, 0])).unwrap_err();

        assert_eq!(
            err,
            TokenError::RotationOutOfRange {
                values: vec![0, -1, 0, 0],
                rot_bins: N_DISCRETE_ROT_BINS,
            }
        );
    }
}

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Front,
    Top,
}

impl View {
    pub const ALL: [View; 2] = [View::Front, View::Top];

    pub fn as_str(&self) -> &'static str {
        match self {
            View::Front => "front",
            View::Top => "top",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PoseActionType {
    Pose0Position,
    Pose1Position,
    Pose0Rotation,
    Pose1Rotation,
}

impl PoseActionType {
    pub const ALL: [PoseActionType; 4] = [
        PoseActionType::Pose0Position,
        PoseActionType::Pose1Position,
        PoseActionType::Pose0Rotation,
        PoseActionType::Pose1Rotation,
    ];

    pub fn is_position(&self) -> bool {
        matches!(
            self,
            PoseActionType::Pose0Position | PoseActionType::Pose1Position
        )
    }
}

/// One value for every camera view.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PerView<T> {
    pub front: T,
    pub top: T,
}

impl<T> PerView<T> {
    pub fn from_fn<F: FnMut(View) -> T>(f: F) -> Self {
        let [front, top] = View::ALL.map(f);
        Self { front, top }
    }

    pub fn try_from_fn<E, F: FnMut(View) -> Result<T, E>>(f: F) -> Result<Self, E> {
        let [front, top] = View::ALL.map(f);
        Ok(Self {
            front: front?,
            top: top?,
        })
    }

    pub fn get(&self, view: View) -> &T {
        match view {
            View::Front => &self.front,
            View::Top => &self.top,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, mut f: F) -> PerView<U> {
        PerView {
            front: f(self.front),
            top: f(self.top),
        }
    }
}

/// One value for every pose action type, e.g. the per-modality action tensors.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PerPoseAction<T> {
    pub pose0_position: T,
    pub pose1_position: T,
    pub pose0_rotation: T,
    pub pose1_rotation: T,
}

impl<T> PerPoseAction<T> {
    pub fn from_fn<F: FnMut(PoseActionType) -> T>(f: F) -> Self {
        let [pose0_position, pose1_position, pose0_rotation, pose1_rotation] =
            PoseActionType::ALL.map(f);
        Self {
            pose0_position,
            pose1_position,
            pose0_rotation,
            pose1_rotation,
        }
    }

    pub fn try_from_fn<E, F: FnMut(PoseActionType) -> Result<T, E>>(f: F) -> Result<Self, E> {
        let [pose0_position, pose1_position, pose0_rotation, pose1_rotation] =
            PoseActionType::ALL.map(f);
        Ok(Self {
            pose0_position: pose0_position?,
            pose1_position: pose1_position?,
            pose0_rotation: pose0_rotation?,
            pose1_rotation: pose1_rotation?,
        })
    }

    pub fn get(&self, pose_action_type: PoseActionType) -> &T {
        match pose_action_type {
            PoseActionType::Pose0Position => &self.pose0_position,
            PoseActionType::Pose1Position => &self.pose1_position,
            PoseActionType::Pose0Rotation => &self.pose0_rotation,
            PoseActionType::Pose1Rotation => &self.pose1_rotation,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, mut f: F) -> PerPoseAction<U> {
        PerPoseAction {
            pose0_position: f(self.pose0_position),
            pose1_position: f(self.pose1_position),
            pose0_rotation: f(self.pose0_rotation),
            pose1_rotation: f(self.pose1_rotation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_view_visits_views_in_declared_order() {
        let mut visited = Vec::new();
        let per_view = PerView::from_fn(|view| {
            visited.push(view);
            view.as_str().len()
        });

        assert_eq!(visited, View::ALL.to_vec());
        assert_eq!(*per_view.get(View::Front), 5);
        assert_eq!(*per_view.get(View::Top), 3);
    }

    #[test]
    fn per_pose_action_try_from_fn_returns_first_error() {
        let result: Result<PerPoseAction<u8>, PoseActionType> =
            PerPoseAction::try_from_fn(|key| if key.is_position() { Ok(1) } else { Err(key) });

        assert_eq!(result, Err(PoseActionType::Pose0Rotation));
    }

    #[test]
    fn per_view_map_keeps_every_view() {
        let per_view = PerView { front: 1, top: 2 };
        let mapped = per_view.map(|value| value * 10);

        assert_eq!(mapped, PerView { front: 10, top: 20 });
    }

    #[test]
    fn per_pose_action_fills_fields_in_key_order() {
        let per_pose_action = PerPoseAction::from_fn(|key| key);

        for key in PoseActionType::ALL {
            assert_eq!(*per_pose_action.get(key), key);
        }
    }
}

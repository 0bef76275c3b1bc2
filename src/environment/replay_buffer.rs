use burn::tensor::{backend::Backend, Bool, Element, ElementConversion, Numeric, Tensor};
use tracing::{debug, info};

use crate::data::collate::{pad_batch, pad_mask_batch};
use crate::error::BufferError;
use crate::structures::keys::PerPoseAction;
use crate::structures::model::ModelInstance;
use crate::structures::vima::{EpisodeRecord, Observation, PoseAction};

/// A value that can be set once per episode.
#[derive(Clone, Debug, Default)]
pub enum WriteOnce<T> {
    #[default]
    Unset,
    Set(T),
}

impl<T> WriteOnce<T> {
    pub fn set(&mut self, value: T, field: &'static str) -> Result<(), BufferError> {
        match self {
            WriteOnce::Unset => {
                *self = WriteOnce::Set(value);
                Ok(())
            }
            WriteOnce::Set(_) => Err(BufferError::AlreadySet(field)),
        }
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            WriteOnce::Unset => None,
            WriteOnce::Set(value) => Some(value),
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, WriteOnce::Set(_))
    }
}

/// Append-only record of one value per step.
#[derive(Clone, Debug)]
pub struct StepLog<T> {
    steps: Vec<T>,
}

impl<T> Default for StepLog<T> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<T> StepLog<T> {
    pub fn push(&mut self, step: T) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[T] {
        &self.steps
    }

    pub fn last(&self) -> Option<&T> {
        self.steps.last()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn check_step_shape(dims: &[usize]) -> Result<(), BufferError> {
    if dims.len() >= 2 && dims[0] == 1 && dims[1] == 1 {
        Ok(())
    } else {
        Err(BufferError::UnexpectedStepShape {
            dims: dims.to_vec(),
        })
    }
}

/// Fold per-step tensors of shape [1, 1, ...] into one [1, T, ...] tensor.
///
/// The trailing dims are right-padded to the largest extent across steps, which is the same as
/// dropping the two leading dims, collating the steps and adding the batch dim back.
pub fn materialize_steps<B, const D: usize, K, E>(
    steps: &[Tensor<B, D, K>],
    pad_value: E,
) -> Result<Tensor<B, D, K>, BufferError>
where
    B: Backend,
    K: Numeric<B>,
    K::Elem: Element,
    E: ElementConversion + Copy,
{
    for step in steps {
        check_step_shape(&step.dims())?;
    }

    let padded = pad_batch(steps.to_vec(), pad_value)?;
    Ok(Tensor::cat(padded, 1))
}

pub fn materialize_mask_steps<B: Backend, const D: usize>(
    steps: &[Tensor<B, D, Bool>],
) -> Result<Tensor<B, D, Bool>, BufferError> {
    for step in steps {
        check_step_shape(&step.dims())?;
    }

    let padded = pad_mask_batch(steps.to_vec())?;
    Ok(Tensor::cat(padded, 1))
}

/// Buffer for the current episode to allow replay.
///
/// The const params are the ranks of the per-step encodings, which all start with a batch dim
/// and a step dim of size 1. The defaults match the policy: observations `[1, 1, O, E]` with
/// masks `[1, 1, O]`, and actions `[1, 1, E]` with masks `[1, 1]`.
#[derive(Clone, Debug)]
pub struct ReplayBuffer<
    B: Backend,
    const OBS: usize = 4,
    const OBS_MASK: usize = 3,
    const ACT: usize = 3,
    const ACT_MASK: usize = 2,
> {
    observations: StepLog<Observation<B>>,
    actions: StepLog<PoseAction<B>>,
    success_per_step: StepLog<bool>,

    encoded_prompt: WriteOnce<Tensor<B, 3>>,
    encoded_prompt_mask: WriteOnce<Tensor<B, 2, Bool>>,
    encoded_observations: StepLog<Tensor<B, OBS>>,
    encoded_observation_masks: StepLog<Tensor<B, OBS_MASK, Bool>>,
    encoded_actions: StepLog<Tensor<B, ACT>>,
    encoded_action_masks: StepLog<Tensor<B, ACT_MASK, Bool>>,
}

impl<
        B: Backend,
        const OBS: usize,
        const OBS_MASK: usize,
        const ACT: usize,
        const ACT_MASK: usize,
    > Default for ReplayBuffer<B, OBS, OBS_MASK, ACT, ACT_MASK>
{
    fn default() -> Self {
        Self {
            observations: StepLog::default(),
            actions: StepLog::default(),
            success_per_step: StepLog::default(),
            encoded_prompt: WriteOnce::Unset,
            encoded_prompt_mask: WriteOnce::Unset,
            encoded_observations: StepLog::default(),
            encoded_observation_masks: StepLog::default(),
            encoded_actions: StepLog::default(),
            encoded_action_masks: StepLog::default(),
        }
    }
}

impl<
        B: Backend,
        const OBS: usize,
        const OBS_MASK: usize,
        const ACT: usize,
        const ACT_MASK: usize,
    > ReplayBuffer<B, OBS, OBS_MASK, ACT, ACT_MASK>
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of steps taken, i.e. encoded actions.
    pub fn len(&self) -> usize {
        self.num_actions()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_observations(&self) -> usize {
        self.encoded_observations.len()
    }

    pub fn num_actions(&self) -> usize {
        self.encoded_actions.len()
    }

    pub fn observations(&self) -> &[Observation<B>] {
        self.observations.steps()
    }

    pub fn actions(&self) -> &[PoseAction<B>] {
        self.actions.steps()
    }

    pub fn success_per_step(&self) -> &[bool] {
        self.success_per_step.steps()
    }

    /// Whether the task is successful, as per the last step.
    pub fn is_successful(&self) -> bool {
        self.success_per_step.last().copied().unwrap_or(false)
    }

    pub fn update_success_tracker(&mut self, is_successful: bool) {
        self.success_per_step.push(is_successful);
    }

    pub fn add_observation(&mut self, observation: Observation<B>) {
        self.observations.push(observation);
    }

    /// Record the continuous actions, indexed by the order they were taken in.
    pub fn add_action(&mut self, continuous_actions: PerPoseAction<Tensor<B, 1>>) {
        let continuous_actions = continuous_actions.map(|tensor| tensor.detach());
        let action = PoseAction::from_pose_tensors(self.actions.len(), continuous_actions);
        self.actions.push(action);
    }

    pub fn add_next_encoded_observation(
        &mut self,
        encoded_observation: Tensor<B, OBS>,
        encoded_observation_mask: Tensor<B, OBS_MASK, Bool>,
    ) {
        self.encoded_observations.push(encoded_observation);
        self.encoded_observation_masks.push(encoded_observation_mask);
    }

    pub fn add_next_encoded_action(
        &mut self,
        encoded_action: Tensor<B, ACT>,
        encoded_action_mask: Tensor<B, ACT_MASK, Bool>,
    ) {
        self.encoded_actions.push(encoded_action);
        self.encoded_action_masks.push(encoded_action_mask);
    }

    pub fn encoded_prompt(&self) -> Result<Tensor<B, 3>, BufferError> {
        self.encoded_prompt
            .get()
            .cloned()
            .ok_or(BufferError::NotSet("encoded prompt"))
    }

    pub fn set_encoded_prompt(&mut self, encoded_prompt: Tensor<B, 3>) -> Result<(), BufferError> {
        debug!(dims = ?encoded_prompt.dims(), "Setting the encoded prompt");
        self.encoded_prompt.set(encoded_prompt, "encoded prompt")
    }

    pub fn encoded_prompt_mask(&self) -> Result<Tensor<B, 2, Bool>, BufferError> {
        self.encoded_prompt_mask
            .get()
            .cloned()
            .ok_or(BufferError::NotSet("encoded prompt mask"))
    }

    pub fn set_encoded_prompt_mask(
        &mut self,
        encoded_prompt_mask: Tensor<B, 2, Bool>,
    ) -> Result<(), BufferError> {
        self.encoded_prompt_mask.set(encoded_prompt_mask, "encoded prompt mask")
    }

    /// All encoded observations so far, as [1, T, ...].
    pub fn encoded_observations(&self) -> Result<Tensor<B, OBS>, BufferError> {
        materialize_steps(self.encoded_observations.steps(), 0.0)
    }

    pub fn encoded_observation_masks(&self) -> Result<Tensor<B, OBS_MASK, Bool>, BufferError> {
        materialize_mask_steps(self.encoded_observation_masks.steps())
    }

    /// All encoded actions so far, or `None` before the first action.
    pub fn encoded_actions(&self) -> Result<Option<Tensor<B, ACT>>, BufferError> {
        if self.encoded_actions.is_empty() {
            return Ok(None);
        }

        materialize_steps(self.encoded_actions.steps(), 0.0).map(Some)
    }

    pub fn encoded_actions_mask(&self) -> Result<Option<Tensor<B, ACT_MASK, Bool>>, BufferError> {
        if self.encoded_action_masks.is_empty() {
            return Ok(None);
        }

        materialize_mask_steps(self.encoded_action_masks.steps()).map(Some)
    }

    pub fn to_model_instance(
        &self,
    ) -> Result<ModelInstance<B, OBS, OBS_MASK, ACT, ACT_MASK>, BufferError> {
        Ok(ModelInstance {
            encoded_prompt: self.encoded_prompt()?,
            encoded_prompt_mask: self.encoded_prompt_mask()?,
            encoded_observations: self.encoded_observations()?,
            encoded_observations_mask: self.encoded_observation_masks()?,
            encoded_actions: self.encoded_actions()?,
            encoded_actions_mask: self.encoded_actions_mask()?,
        })
    }

    /// The raw trajectory of the episode so far.
    ///
    /// Every raw observation must have been encoded, otherwise the record would not describe the
    /// steps the policy saw.
    pub fn episode_record(&self) -> Result<EpisodeRecord<B>, BufferError> {
        if self.observations.len() != self.encoded_observations.len() {
            return Err(BufferError::LockstepMismatch {
                observations: self.observations.len(),
                encoded: self.encoded_observations.len(),
            });
        }

        Ok(EpisodeRecord {
            observations: self.observations.steps().to_vec(),
            pose_actions: self.actions.steps().to_vec(),
            total_steps: self.len(),
            is_successful_at_end: self.is_successful(),
            success_per_step: self.success_per_step.steps().to_vec(),
        })
    }

    pub fn reset(&mut self) {
        info!("Resetting the state");
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollateError;
    use crate::structures::keys::PerView;
    use burn::backend::NdArray;

    type TestBackend = NdArray;
    // Observations as [1, 1, E] with masks [1, 1, E]
    type FlatBuffer = ReplayBuffer<TestBackend, 3, 3, 3, 2>;

    fn step(dim: usize, value: f32) -> Tensor<TestBackend, 3> {
        Tensor::ones([1, 1, dim]).mul_scalar(value)
    }

    fn mask(dim: usize) -> Tensor<TestBackend, 3, Bool> {
        Tensor::<TestBackend, 3>::ones([1, 1, dim]).equal_elem(1.0)
    }

    fn action_mask() -> Tensor<TestBackend, 2, Bool> {
        Tensor::<TestBackend, 2>::ones([1, 1]).equal_elem(1.0)
    }

    fn observation(index: usize) -> Observation<TestBackend> {
        Observation {
            index,
            rgb: PerView::from_fn(|_| Tensor::zeros([3, 2, 2])),
            segm: PerView::from_fn(|_| Tensor::zeros([2, 2])),
            end_effector: Tensor::zeros([2]),
        }
    }

    #[test]
    fn encoded_observations_are_padded_across_steps() {
        let mut buffer = FlatBuffer::new();
        buffer.add_next_encoded_observation(step(5, 1.0), mask(5));
        buffer.add_next_encoded_observation(step(7, 2.0), mask(7));
        buffer.add_next_encoded_observation(step(5, 3.0), mask(5));

        let observations = buffer.encoded_observations().unwrap();

        assert_eq!(observations.dims(), [1, 3, 7]);
        let values: Vec<f32> = observations.into_data().value;
        assert_eq!(&values[..7], &[1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
        assert!(values[7..14].iter().all(|v| *v == 2.0));
        assert_eq!(&values[14..], &[3.0, 3.0, 3.0, 3.0, 3.0, 0.0, 0.0]);

        let masks = buffer.encoded_observation_masks().unwrap();
        assert_eq!(masks.dims(), [1, 3, 7]);
        let masks: Vec<bool> = masks.into_data().value;
        assert_eq!(masks.iter().filter(|m| **m).count(), 17);
    }

    #[test]
    fn empty_steps_are_padded_like_any_other() {
        let mut buffer = FlatBuffer::new();
        buffer.add_next_encoded_observation(step(0, 1.0), mask(0));
        buffer.add_next_encoded_observation(step(5, 2.0), mask(5));

        let observations = buffer.encoded_observations().unwrap();

        assert_eq!(observations.dims(), [1, 2, 5]);
        let values: Vec<f32> = observations.into_data().value;
        assert!(values[..5].iter().all(|v| *v == 0.0));
        assert!(values[5..].iter().all(|v| *v == 2.0));

        let masks: Vec<bool> = buffer.encoded_observation_masks().unwrap().into_data().value;
        assert_eq!(&masks[..5], &[false; 5]);
        assert_eq!(&masks[5..], &[true; 5]);
    }

    #[test]
    fn actions_are_absent_until_the_first_action() {
        let mut buffer = FlatBuffer::new();

        assert!(buffer.encoded_actions().unwrap().is_none());
        assert!(buffer.encoded_actions_mask().unwrap().is_none());

        buffer.add_next_encoded_action(step(4, 1.0), action_mask());

        let actions = buffer.encoded_actions().unwrap().unwrap();
        let masks = buffer.encoded_actions_mask().unwrap().unwrap();
        assert_eq!(actions.dims(), [1, 1, 4]);
        assert_eq!(masks.dims(), [1, 1]);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn reading_observations_before_any_step_is_an_error() {
        let buffer = FlatBuffer::new();

        assert_eq!(
            buffer.encoded_observations().unwrap_err(),
            BufferError::Collate(CollateError::EmptyBatch)
        );
    }

    #[test]
    fn steps_must_have_unit_batch_and_step_dims() {
        let mut buffer = FlatBuffer::new();
        buffer.add_next_encoded_observation(Tensor::ones([2, 1, 5]), mask(5));

        assert_eq!(
            buffer.encoded_observations().unwrap_err(),
            BufferError::UnexpectedStepShape {
                dims: vec![2, 1, 5]
            }
        );
    }

    #[test]
    fn prompt_can_only_be_set_once() {
        let mut buffer = FlatBuffer::new();
        let prompt = Tensor::<TestBackend, 3>::ones([1, 4, 8]);

        assert_eq!(
            buffer.encoded_prompt().unwrap_err(),
            BufferError::NotSet("encoded prompt")
        );
        buffer.set_encoded_prompt(prompt.clone()).unwrap();
        assert_eq!(
            buffer.encoded_prompt().unwrap().into_data(),
            prompt.clone().into_data()
        );
        assert_eq!(
            buffer.set_encoded_prompt(prompt.clone()).unwrap_err(),
            BufferError::AlreadySet("encoded prompt")
        );

        buffer
            .set_encoded_prompt_mask(Tensor::<TestBackend, 2>::ones([1, 4]).equal_elem(1.0))
            .unwrap();
        assert!(buffer
            .set_encoded_prompt_mask(Tensor::<TestBackend, 2>::ones([1, 4]).equal_elem(1.0))
            .is_err());

        buffer.reset();
        assert!(buffer.set_encoded_prompt(prompt).is_ok());
    }

    #[test]
    fn reset_twice_is_the_same_as_once() {
        let mut buffer = FlatBuffer::new();
        buffer.add_observation(observation(0));
        buffer.add_next_encoded_observation(step(3, 1.0), mask(3));
        buffer.add_next_encoded_action(step(3, 1.0), action_mask());
        buffer.update_success_tracker(true);
        buffer.set_encoded_prompt(Tensor::ones([1, 2, 3])).unwrap();

        buffer.reset();
        buffer.reset();

        assert!(buffer.is_empty());
        assert_eq!(buffer.num_observations(), 0);
        assert!(buffer.observations().is_empty());
        assert!(buffer.success_per_step().is_empty());
        assert!(!buffer.is_successful());
        assert!(buffer.encoded_prompt().is_err());
        assert!(buffer.encoded_actions().unwrap().is_none());
    }

    #[test]
    fn success_follows_the_last_step() {
        let mut buffer = FlatBuffer::new();
        assert!(!buffer.is_successful());

        buffer.update_success_tracker(true);
        assert!(buffer.is_successful());

        buffer.update_success_tracker(false);
        assert!(!buffer.is_successful());
        assert_eq!(buffer.success_per_step(), &[true, false]);
    }

    #[test]
    fn model_instance_packages_the_episode() {
        let mut buffer = FlatBuffer::new();
        buffer.set_encoded_prompt(Tensor::ones([1, 4, 8])).unwrap();
        buffer
            .set_encoded_prompt_mask(Tensor::<TestBackend, 2>::ones([1, 4]).equal_elem(1.0))
            .unwrap();
        buffer.add_next_encoded_observation(step(8, 1.0), mask(8));

        let instance = buffer.to_model_instance().unwrap();

        assert_eq!(instance.encoded_prompt.dims(), [1, 4, 8]);
        assert_eq!(instance.encoded_observations.dims(), [1, 1, 8]);
        assert_eq!(instance.encoded_observations_mask.dims(), [1, 1, 8]);
        assert!(instance.encoded_actions.is_none());
        assert!(instance.encoded_actions_mask.is_none());
    }

    #[test]
    fn default_ranks_carry_objects_per_observation() {
        let mut buffer: ReplayBuffer<TestBackend> = ReplayBuffer::new();
        buffer.add_next_encoded_observation(
            Tensor::ones([1, 1, 2, 8]),
            Tensor::<TestBackend, 3>::ones([1, 1, 2]).equal_elem(1.0),
        );
        buffer.add_next_encoded_observation(
            Tensor::ones([1, 1, 3, 8]),
            Tensor::<TestBackend, 3>::ones([1, 1, 3]).equal_elem(1.0),
        );

        assert_eq!(buffer.encoded_observations().unwrap().dims(), [1, 2, 3, 8]);
        let masks: Vec<bool> = buffer.encoded_observation_masks().unwrap().into_data().value;
        assert_eq!(masks, vec![true, true, false, true, true, true]);
    }

    #[test]
    fn actions_are_indexed_in_order() {
        let mut buffer = FlatBuffer::new();
        for _ in 0..2 {
            buffer.add_action(PerPoseAction::from_fn(|_| Tensor::zeros([2])));
        }

        let indices: Vec<usize> = buffer.actions().iter().map(|a| a.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn episode_record_requires_every_observation_encoded() {
        let mut buffer = FlatBuffer::new();
        buffer.add_observation(observation(0));
        buffer.add_observation(observation(1));
        buffer.add_next_encoded_observation(step(3, 1.0), mask(3));

        assert_eq!(
            buffer.episode_record().unwrap_err(),
            BufferError::LockstepMismatch {
                observations: 2,
                encoded: 1
            }
        );

        buffer.add_next_encoded_observation(step(3, 1.0), mask(3));
        buffer.add_action(PerPoseAction::from_fn(|_| Tensor::zeros([2])));
        buffer.add_next_encoded_action(step(3, 1.0), action_mask());
        buffer.update_success_tracker(true);

        let record = buffer.episode_record().unwrap();
        assert_eq!(record.observations.len(), 2);
        assert_eq!(record.pose_actions.len(), 1);
        assert_eq!(record.total_steps, 1);
        assert!(record.is_successful_at_end);
        assert_eq!(record.success_per_step, vec![true]);
    }
}

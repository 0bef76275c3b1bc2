use burn::tensor::{backend::Backend, Bool, Int, Tensor};

use super::keys::{PerPoseAction, PerView};
use super::token::TokenType;
use super::vima::Task;

/// Features of the objects in a scene, for each view.
#[derive(Clone, Debug)]
pub struct ObjectFeatures<Bbox, Crop, Mask> {
    pub bbox: PerView<Bbox>,
    pub cropped_img: PerView<Crop>,
    pub mask: PerView<Mask>,
}

/// Object features plus the full RGB frame, for each view.
#[derive(Clone, Debug)]
pub struct VisualFeatures<Bbox, Crop, Mask, Rgb> {
    pub objects: ObjectFeatures<Bbox, Crop, Mask>,
    pub rgb: PerView<Rgb>,
}

#[derive(Clone, Debug)]
pub struct ObservationFeatures<Ee, Bbox, Crop, Mask, Rgb> {
    pub ee: Ee,
    pub objects: ObjectFeatures<Bbox, Crop, Mask>,
    pub rgb: PerView<Rgb>,
}

pub type InstanceObjectFeatures<B> = ObjectFeatures<
    Tensor<B, 3>,       // [T, O, 4]
    Tensor<B, 5>,       // [T, O, C, H, W]
    Tensor<B, 2, Bool>, // [T, O]
>;

pub type BatchedObjectFeatures<B> = ObjectFeatures<
    Tensor<B, 4>,       // [N, T, O, 4]
    Tensor<B, 6>,       // [N, T, O, C, H, W]
    Tensor<B, 3, Bool>, // [N, T, O]
>;

pub type InstanceVisualFeatures<B> =
    VisualFeatures<Tensor<B, 3>, Tensor<B, 5>, Tensor<B, 2, Bool>, Tensor<B, 4>>;

pub type BatchedVisualFeatures<B> =
    VisualFeatures<Tensor<B, 4>, Tensor<B, 6>, Tensor<B, 3, Bool>, Tensor<B, 5>>;

pub type InstanceObservations<B> = ObservationFeatures<
    Tensor<B, 1, Int>, // [T]
    Tensor<B, 3>,
    Tensor<B, 5>,
    Tensor<B, 2, Bool>,
    Tensor<B, 4>, // [T, C, H, W]
>;

pub type BatchedObservations<B> = ObservationFeatures<
    Tensor<B, 2, Int>, // [N, T]
    Tensor<B, 4>,
    Tensor<B, 6>,
    Tensor<B, 3, Bool>,
    Tensor<B, 5>, // [N, T, C, H, W]
>;

pub type InstanceActions<B> = PerPoseAction<Tensor<B, 2, Int>>; // [T, D_a]
pub type BatchedActions<B> = PerPoseAction<Tensor<B, 3, Int>>; // [N, T, D_a]

impl<B: Backend> InstanceObjectFeatures<B> {
    pub fn to_device(self, device: &B::Device) -> Self {
        ObjectFeatures {
            bbox: self.bbox.map(|t| t.to_device(device)),
            cropped_img: self.cropped_img.map(|t| t.to_device(device)),
            mask: self.mask.map(|t| t.to_device(device)),
        }
    }
}

/// A single instance, preprocessed for the model but not yet batched.
#[derive(Clone, Debug)]
pub struct PreprocessedInstance<B: Backend> {
    pub task: Task,
    pub raw_prompts_token_type: Vec<Vec<TokenType>>,
    pub word_batch: Tensor<B, 1, Int>, // [L]
    pub image_batch: InstanceVisualFeatures<B>,
    pub observations: InstanceObservations<B>,
    pub actions: InstanceActions<B>,
}

impl<B: Backend> PreprocessedInstance<B> {
    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            task: self.task,
            raw_prompts_token_type: self.raw_prompts_token_type,
            word_batch: self.word_batch.to_device(device),
            image_batch: VisualFeatures {
                objects: self.image_batch.objects.to_device(device),
                rgb: self.image_batch.rgb.map(|t| t.to_device(device)),
            },
            observations: ObservationFeatures {
                ee: self.observations.ee.to_device(device),
                objects: self.observations.objects.to_device(device),
                rgb: self.observations.rgb.map(|t| t.to_device(device)),
            },
            actions: self.actions.map(|t| t.to_device(device)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PreprocessedBatch<B: Backend> {
    pub task: Vec<Task>,
    pub raw_prompts_token_type: Vec<Vec<TokenType>>,
    pub word_batch: Tensor<B, 2, Int>, // [N, L]
    pub image_batch: BatchedVisualFeatures<B>,
    pub observations: BatchedObservations<B>,
    pub actions: BatchedActions<B>,
}

impl<B: Backend> PreprocessedBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.task.len()
    }
}

/// Snapshot of an episode so far, as consumed by the policy.
#[derive(Clone, Debug)]
pub struct ModelInstance<
    B: Backend,
    const OBS: usize = 4,
    const OBS_MASK: usize = 3,
    const ACT: usize = 3,
    const ACT_MASK: usize = 2,
> {
    pub encoded_prompt: Tensor<B, 3>,            // [1, L, E]
    pub encoded_prompt_mask: Tensor<B, 2, Bool>, // [1, L]
    pub encoded_observations: Tensor<B, OBS>,    // [1, T, O, E]
    pub encoded_observations_mask: Tensor<B, OBS_MASK, Bool>, // [1, T, O]
    pub encoded_actions: Option<Tensor<B, ACT>>, // [1, T, E]
    pub encoded_actions_mask: Option<Tensor<B, ACT_MASK, Bool>>, // [1, T]
}

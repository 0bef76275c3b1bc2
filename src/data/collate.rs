use burn::tensor::{backend::Backend, Bool, Element, ElementConversion, Int, Numeric, Tensor};

use crate::data::batcher::CollateConfig;
use crate::error::CollateError;
use crate::structures::keys::{PerPoseAction, PerView};
use crate::structures::model::{
    BatchedActions, BatchedObjectFeatures, BatchedObservations, BatchedVisualFeatures,
    InstanceActions, InstanceObjectFeatures, InstanceObservations, InstanceVisualFeatures,
    ObjectFeatures, ObservationFeatures, PreprocessedBatch, PreprocessedInstance, VisualFeatures,
};
use crate::utils::{deficits, max_extents, pad_to_shape};

/// Actions are padded with the value ignored by the loss.
pub const DEFAULT_ACTION_PAD_VALUE: i32 = -100;

/// Pad every tensor at the end of each axis so they all share the largest extent per axis.
///
/// Tensors that already have the target shape are returned untouched, and the order of the batch
/// is preserved.
pub fn pad_batch<B, const D: usize, K, E>(
    batch: Vec<Tensor<B, D, K>>,
    pad_value: E,
) -> Result<Vec<Tensor<B, D, K>>, CollateError>
where
    B: Backend,
    K: Numeric<B>,
    K::Elem: Element,
    E: ElementConversion + Copy,
{
    if batch.is_empty() {
        return Err(CollateError::EmptyBatch);
    }

    let shapes: Vec<[usize; D]> = batch.iter().map(|tensor| tensor.dims()).collect();
    let target = max_extents(&shapes);
    let needs_padding: Vec<bool> = shapes
        .iter()
        .map(|shape| deficits(shape, &target).iter().any(|deficit| *deficit > 0))
        .collect();

    if !needs_padding.iter().any(|needed| *needed) {
        return Ok(batch);
    }

    Ok(batch
        .into_iter()
        .zip(needs_padding)
        .map(|(tensor, needed)| {
            if needed {
                pad_to_shape(tensor, target, pad_value)
            } else {
                tensor
            }
        })
        .collect())
}

/// Same as [pad_batch], for boolean masks, which are always padded with `false`.
pub fn pad_mask_batch<B: Backend, const D: usize>(
    batch: Vec<Tensor<B, D, Bool>>,
) -> Result<Vec<Tensor<B, D, Bool>>, CollateError> {
    let batch: Vec<Tensor<B, D, Int>> = batch.into_iter().map(|mask| mask.int()).collect();
    let padded = pad_batch(batch, 0)?;

    Ok(padded.into_iter().map(|mask| mask.greater_elem(0)).collect())
}

/// Collate tensors with multiple dims of variable lengths into a single tensor.
///
/// Each dim is right-padded to the largest extent in the batch with `pad_value`, then the tensors
/// are stacked on a new leading batch dim, so `D2` must be `D + 1`.
pub fn collate_variable_ndim_batch<B, const D: usize, const D2: usize, K, E>(
    batch: Vec<Tensor<B, D, K>>,
    pad_value: E,
) -> Result<Tensor<B, D2, K>, CollateError>
where
    B: Backend,
    K: Numeric<B>,
    K::Elem: Element,
    E: ElementConversion + Copy,
{
    assert_eq!(D2, D + 1, "Collated tensors must have exactly one more dim");

    let padded = pad_batch(batch, pad_value)?;
    Ok(Tensor::stack(padded, 0))
}

pub fn collate_mask_batch<B: Backend, const D: usize, const D2: usize>(
    batch: Vec<Tensor<B, D, Bool>>,
) -> Result<Tensor<B, D2, Bool>, CollateError> {
    assert_eq!(D2, D + 1, "Collated tensors must have exactly one more dim");

    let padded = pad_mask_batch(batch)?;
    Ok(Tensor::stack(padded, 0))
}

/// Pad token sequences to the longest one, batch first.
pub fn pad_sequence<B: Backend>(
    sequences: Vec<Tensor<B, 1, Int>>,
    pad_value: i32,
) -> Result<Tensor<B, 2, Int>, CollateError> {
    collate_variable_ndim_batch(sequences, pad_value)
}

fn collate_views<B, const D: usize, const D2: usize, K, E>(
    views: &[&PerView<Tensor<B, D, K>>],
    pad_value: E,
) -> Result<PerView<Tensor<B, D2, K>>, CollateError>
where
    B: Backend,
    K: Numeric<B>,
    K::Elem: Element,
    E: ElementConversion + Copy,
{
    PerView::try_from_fn(|view| {
        collate_variable_ndim_batch(
            views.iter().map(|per_view| per_view.get(view).clone()).collect(),
            pad_value,
        )
    })
}

fn collate_mask_views<B: Backend, const D: usize, const D2: usize>(
    views: &[&PerView<Tensor<B, D, Bool>>],
) -> Result<PerView<Tensor<B, D2, Bool>>, CollateError> {
    PerView::try_from_fn(|view| {
        collate_mask_batch(views.iter().map(|per_view| per_view.get(view).clone()).collect())
    })
}

/// Collate features from multiple objects into a single object feature.
pub fn collate_object_features<B: Backend>(
    features: &[&InstanceObjectFeatures<B>],
    pad_value: f32,
) -> Result<BatchedObjectFeatures<B>, CollateError> {
    let bbox: Vec<_> = features.iter().map(|f| &f.bbox).collect();
    let cropped_img: Vec<_> = features.iter().map(|f| &f.cropped_img).collect();
    let mask: Vec<_> = features.iter().map(|f| &f.mask).collect();

    Ok(ObjectFeatures {
        bbox: collate_views(&bbox, pad_value)?,
        cropped_img: collate_views(&cropped_img, pad_value)?,
        mask: collate_mask_views(&mask)?,
    })
}

/// Collate the RGB frames across instances: [N, max images, C, H, W] per view.
pub fn collate_rgb_images<B: Backend>(
    rgb_images: &[&PerView<Tensor<B, 4>>],
    pad_value: f32,
) -> Result<PerView<Tensor<B, 5>>, CollateError> {
    collate_views(rgb_images, pad_value)
}

/// Collate the actions across an entire batch.
pub fn collate_action_batch<B: Backend>(
    actions: &[&InstanceActions<B>],
    pad_value: i32,
) -> Result<BatchedActions<B>, CollateError> {
    PerPoseAction::try_from_fn(|pose_action_type| {
        collate_variable_ndim_batch(
            actions
                .iter()
                .map(|action| action.get(pose_action_type).clone())
                .collect(),
            pad_value,
        )
    })
}

pub fn collate_observation_batch<B: Backend>(
    observations: &[&InstanceObservations<B>],
    pad_value: f32,
) -> Result<BatchedObservations<B>, CollateError> {
    let ee = collate_variable_ndim_batch(
        observations.iter().map(|obs| obs.ee.clone()).collect(),
        0,
    )?;
    let objects: Vec<_> = observations.iter().map(|obs| &obs.objects).collect();
    let rgb: Vec<_> = observations.iter().map(|obs| &obs.rgb).collect();

    Ok(ObservationFeatures {
        ee,
        objects: collate_object_features(&objects, pad_value)?,
        rgb: collate_rgb_images(&rgb, pad_value)?,
    })
}

pub fn collate_image_batch<B: Backend>(
    image_batches: &[&InstanceVisualFeatures<B>],
    pad_value: f32,
) -> Result<BatchedVisualFeatures<B>, CollateError> {
    let objects: Vec<_> = image_batches.iter().map(|batch| &batch.objects).collect();
    let rgb: Vec<_> = image_batches.iter().map(|batch| &batch.rgb).collect();

    Ok(VisualFeatures {
        objects: collate_object_features(&objects, pad_value)?,
        rgb: collate_rgb_images(&rgb, pad_value)?,
    })
}

/// Collate preprocessed instances into a batch.
pub fn collate_preprocessed_instances<B: Backend>(
    instances: &[PreprocessedInstance<B>],
    config: &CollateConfig,
) -> Result<PreprocessedBatch<B>, CollateError> {
    if instances.is_empty() {
        return Err(CollateError::EmptyBatch);
    }

    let task = instances.iter().map(|instance| instance.task).collect();

    // Each instance holds a list of prompts, so only flatten one level
    let raw_prompts_token_type = instances
        .iter()
        .flat_map(|instance| instance.raw_prompts_token_type.iter().cloned())
        .collect();

    let word_batch = pad_sequence(
        instances
            .iter()
            .map(|instance| instance.word_batch.clone())
            .collect(),
        config.word_pad_value,
    )?;

    let image_batches: Vec<_> = instances.iter().map(|i| &i.image_batch).collect();
    let actions: Vec<_> = instances.iter().map(|i| &i.actions).collect();
    let observations: Vec<_> = instances.iter().map(|i| &i.observations).collect();

    Ok(PreprocessedBatch {
        task,
        raw_prompts_token_type,
        word_batch,
        image_batch: collate_image_batch(&image_batches, config.visual_pad_value)?,
        observations: collate_observation_batch(&observations, config.visual_pad_value)?,
        actions: collate_action_batch(&actions, config.action_pad_value)?,
    })
}

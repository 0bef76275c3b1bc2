use burn::config::Config;
use burn::data::dataloader::batcher::Batcher;
use burn::tensor::backend::Backend;

use super::collate::{collate_preprocessed_instances, DEFAULT_ACTION_PAD_VALUE};
use crate::error::CollateError;
use crate::structures::model::{PreprocessedBatch, PreprocessedInstance};

#[derive(Config, Debug)]
pub struct CollateConfig {
    #[config(default = 0.0)]
    pub visual_pad_value: f32,

    #[config(default = -100)]
    pub action_pad_value: i32,

    #[config(default = 0)]
    pub word_pad_value: i32,
}

impl CollateConfig {
    pub fn init<B: Backend>(&self, device: B::Device) -> PreprocessedBatcher<B> {
        PreprocessedBatcher {
            device,
            config: self.clone(),
        }
    }
}

pub struct PreprocessedBatcher<B: Backend> {
    device: B::Device,
    config: CollateConfig,
}

impl<B: Backend> PreprocessedBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        CollateConfig::new().init(device)
    }

    pub fn try_batch(
        &self,
        items: Vec<PreprocessedInstance<B>>,
    ) -> Result<PreprocessedBatch<B>, CollateError> {
        tracing::debug!(batch_size = items.len(), "Collating preprocessed instances");

        let items: Vec<PreprocessedInstance<B>> = items
            .into_iter()
            .map(|item| item.to_device(&self.device))
            .collect();

        collate_preprocessed_instances(&items, &self.config)
    }
}

impl<B: Backend> Batcher<PreprocessedInstance<B>, PreprocessedBatch<B>> for PreprocessedBatcher<B> {
    fn batch(&self, items: Vec<PreprocessedInstance<B>>) -> PreprocessedBatch<B> {
        // The data loader never hands out an empty batch
        self.try_batch(items)
            .expect("Failed to collate preprocessed instances")
    }
}

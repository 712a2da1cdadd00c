use std::path::Path;

use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::api::sync::ApiBuilder;
use tokenizers::Tokenizer;

use super::config::{EmbeddingConfig, ModelType};

/// Maximum token sequence length for BERT models.
/// Attention is O(n²), so longer inputs are truncated.
const MAX_SEQ_LEN: usize = 512;

struct LoadedModel {
    model: BertModel,
    tokenizer: Tokenizer,
}

/// Synchronous sentence embedder: BERT forward pass, masked mean pooling,
/// L2 normalisation. The `Mock` model hashes the text instead.
pub struct EmbeddingEngine {
    loaded: Option<LoadedModel>,
    device: Device,
    dimensions: usize,
}

impl EmbeddingEngine {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_type = config.model;
        if model_type == ModelType::Mock {
            return Ok(Self::mock(model_type.dimensions()));
        }

        let mut builder = ApiBuilder::new().with_progress(false);
        if let Some(dir) = &config.cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }
        let api = builder.build()?;
        let repo = api.model(model_type.repo_id().to_string());

        let config_filename = repo.get("config.json")?;
        let tokenizer_filename = repo.get("tokenizer.json")?;
        let weights_filename = repo.get("model.safetensors")?;

        Self::from_files(
            model_type,
            &config_filename,
            &tokenizer_filename,
            &weights_filename,
        )
    }

    pub fn mock(dimensions: usize) -> Self {
        Self {
            loaded: None,
            device: Device::Cpu,
            dimensions,
        }
    }

    pub fn from_files(
        model_type: ModelType,
        config_path: &Path,
        tokenizer_path: &Path,
        weights_path: &Path,
    ) -> Result<Self> {
        let device = Device::Cpu;

        let config_content = std::fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;

        let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(anyhow::Error::msg)?;

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)? };
        let model = BertModel::load(vb, &config)?;

        Ok(Self {
            loaded: Some(LoadedModel { model, tokenizer }),
            device,
            dimensions: model_type.dimensions(),
        })
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("Model returned no embedding"))
    }

    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let Some(loaded) = &self.loaded else {
            return Ok(texts
                .iter()
                .map(|t| mock_embedding(t, self.dimensions))
                .collect());
        };
        let tokenizer = &loaded.tokenizer;

        let vocab_size = tokenizer.get_vocab_size(true) as u32;
        let unk_id = tokenizer.token_to_id("[UNK]").unwrap_or(0);

        // 1. Tokenize, truncating to prevent O(n²) attention OOM
        let mut all_token_ids = Vec::with_capacity(texts.len());
        let mut all_type_ids = Vec::with_capacity(texts.len());
        let mut max_len = 0;

        for text in texts {
            let tokens = tokenizer
                .encode(text.as_str(), true)
                .map_err(anyhow::Error::msg)?;
            let token_ids: Vec<u32> = tokens
                .get_ids()
                .iter()
                .take(MAX_SEQ_LEN)
                .map(|&id| if id >= vocab_size { unk_id } else { id })
                .collect();
            let type_ids: Vec<u32> = tokens
                .get_type_ids()
                .iter()
                .take(MAX_SEQ_LEN)
                .copied()
                .collect();
            max_len = max_len.max(token_ids.len());
            all_token_ids.push(token_ids);
            all_type_ids.push(type_ids);
        }

        // 2. Pad into batch tensors, remembering which positions are real
        let batch = texts.len();
        let mut flat_ids = Vec::with_capacity(batch * max_len);
        let mut flat_types = Vec::with_capacity(batch * max_len);
        let mut flat_mask = Vec::with_capacity(batch * max_len);

        for (ids, types) in all_token_ids.iter().zip(all_type_ids.iter()) {
            let pad_len = max_len - ids.len();
            flat_ids.extend_from_slice(ids);
            flat_ids.extend(std::iter::repeat_n(0u32, pad_len));
            flat_types.extend_from_slice(types);
            flat_types.extend(std::iter::repeat_n(0u32, max_len - types.len()));
            flat_mask.extend(std::iter::repeat_n(1u32, ids.len()));
            flat_mask.extend(std::iter::repeat_n(0u32, pad_len));
        }

        let token_ids = Tensor::new(flat_ids.as_slice(), &self.device)?.reshape((batch, max_len))?;
        let type_ids = Tensor::new(flat_types.as_slice(), &self.device)?.reshape((batch, max_len))?;

        // 3. Forward pass
        let hidden = loaded.model.forward(&token_ids, &type_ids, None)?;

        // 4. Masked mean pooling: padding tokens must not shift the average
        let mask = Tensor::new(flat_mask.as_slice(), &self.device)?
            .reshape((batch, max_len))?
            .to_dtype(DTYPE)?
            .unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?;
        let pooled = summed.broadcast_div(&counts)?;

        // 5. L2 normalise
        let norms = pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
        let normalized = pooled.broadcast_div(&norms)?;

        Ok(normalized.to_vec2::<f32>()?)
    }
}

/// Deterministic pseudo-embedding derived from the text hash.
fn mock_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let hash = blake3::hash(text.as_bytes());
    let bytes = hash.as_bytes();
    (0..dimensions)
        .map(|i| (bytes[i % 32] as f32 / 255.0) * 2.0 - 1.0)
        .collect()
}

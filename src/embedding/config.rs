use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelType {
    E5Small,
    #[default]
    E5Multi,
    BgeSmall,
    Mock,
}

impl ModelType {
    pub fn repo_id(&self) -> &'static str {
        match self {
            Self::E5Small => "intfloat/multilingual-e5-small",
            Self::E5Multi => "intfloat/multilingual-e5-base",
            Self::BgeSmall => "BAAI/bge-small-en-v1.5",
            Self::Mock => "mock",
        }
    }

    pub fn dimensions(&self) -> usize {
        match self {
            Self::E5Small => 384,
            Self::E5Multi => 768,
            Self::BgeSmall => 384,
            Self::Mock => 768,
        }
    }

    pub fn all() -> &'static [ModelType] {
        &[Self::E5Small, Self::E5Multi, Self::BgeSmall, Self::Mock]
    }
}

impl std::str::FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "e5_small" | "e5-small" => Ok(Self::E5Small),
            "e5_multi" | "e5-multi" | "e5_base" | "e5-base" => Ok(Self::E5Multi),
            "bge_small" | "bge-small" => Ok(Self::BgeSmall),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown model: {}", s)),
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::E5Small => write!(f, "e5_small"),
            Self::E5Multi => write!(f, "e5_multi"),
            Self::BgeSmall => write!(f, "bge_small"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub model: ModelType,
    pub cache_size: usize,
    pub batch_size: usize,
    /// Where model files are downloaded; hf-hub's default cache when `None`.
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: ModelType::E5Multi,
            cache_size: 1000,
            batch_size: 32,
            cache_dir: None,
        }
    }
}

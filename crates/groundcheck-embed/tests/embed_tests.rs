use groundcheck_core::config::{EmbeddingConfig, EmbeddingProvider};
use groundcheck_core::Embedder;
use groundcheck_embed::{default_embedder, HashingEmbedder};

#[test]
fn hashing_embedder_shapes_and_determinism() {
    let embedder = default_embedder(&EmbeddingConfig::default()).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 384, "default dimension");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // bit-identical, not just close
    assert!(v1.iter().zip(v2.iter()).all(|(a, b)| a.to_bits() == b.to_bits()));
}

#[test]
fn separate_instances_agree() {
    let a = HashingEmbedder::new(64).embed("Paris is the capital of France").unwrap();
    let b = HashingEmbedder::new(64).embed("Paris is the capital of France").unwrap();
    assert!(a.bit_eq(&b));
    assert_eq!(a.dim(), 64);
}

#[test]
fn shared_tokens_score_higher_than_unrelated_text() {
    let e = HashingEmbedder::new(256);
    let q = e.embed("capital of France").unwrap();
    let related = e.embed("Paris is the capital of France.").unwrap();
    let unrelated = e.embed("photosynthesis converts light into sugar").unwrap();
    assert!(q.cosine(&related) > q.cosine(&unrelated));
}

#[test]
fn model_id_names_algorithm_and_dimension() {
    let e = HashingEmbedder::new(128);
    assert_eq!(e.model_id(), "hashing:xxh64:d128");
    assert_eq!(e.dim(), 128);
}

#[cfg(not(feature = "model"))]
#[test]
fn bge_provider_without_model_feature_errors() {
    let cfg = EmbeddingConfig { provider: EmbeddingProvider::BgeM3, ..EmbeddingConfig::default() };
    assert!(default_embedder(&cfg).is_err());
}

#[cfg(feature = "model")]
#[test]
fn hashing_provider_still_selected_with_model_feature() {
    let cfg = EmbeddingConfig { provider: EmbeddingProvider::Hashing, dimension: 32, ..EmbeddingConfig::default() };
    assert_eq!(default_embedder(&cfg).unwrap().dim(), 32);
}

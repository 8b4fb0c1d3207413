use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use spindex_core::persist::{load_meta, IndexPaths};
use spindex_core::posting::RecordReader;
use spindex_core::{
    Analyzer, CompressedIndex, DocId, DocumentSource, EnglishAnalyzer, IndexBuilder, IndexConfig, IndexError,
    MemorySource, Posting, PostingLookup, TermRecord, UncompressedIndex,
};

const CORPUS: &[&str] = &[
    "The committee approved the budget for the new bridge.",
    "Bridge repairs were delayed by the winter storms.",
    "Storms and floods damaged the northern roads.",
    "The budget includes funds for roads and bridges.",
    "A new committee will review the flood response.",
    "Winter travel advisories were issued for the roads.",
    "The secretary thanked the committee for its work.",
    "Funds for the bridge were approved last year.",
    "Flood insurance claims rose after the storms.",
    "The northern bridge reopened in early spring.",
    "Spring storms brought more flooding to the valley.",
    "The valley roads were closed for repairs.",
    "Committee members travelled to the valley.",
];

fn config(dir: &Path, capacity: u32, flush_bytes: usize) -> IndexConfig {
    IndexConfig {
        index_dir: dir.to_path_buf(),
        num_documents: CORPUS.len() as u32,
        block_capacity: capacity,
        merge_flush_bytes: flush_bytes,
        ..IndexConfig::default()
    }
}

fn read_records(path: &Path) -> Vec<TermRecord> {
    RecordReader::open(path).unwrap().map(|r| r.unwrap()).collect()
}

/// Postings computed directly from the corpus, without blocks.
fn expected_postings(source: &dyn DocumentSource) -> BTreeMap<String, Vec<Posting>> {
    let mut expected: BTreeMap<String, Vec<Posting>> = BTreeMap::new();
    for doc_id in 1..=CORPUS.len() as DocId {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for term in EnglishAnalyzer.normalize(&source.read_document(doc_id).unwrap()) {
            *counts.entry(term).or_default() += 1;
        }
        for (term, tf) in counts {
            expected.entry(term).or_default().push(Posting::new(doc_id, tf));
        }
    }
    expected
}

#[test]
fn merged_index_is_sorted_and_complete() {
    let dir = tempfile::tempdir().unwrap();
    let source = MemorySource::from_texts(CORPUS.iter().copied());
    let cfg = config(dir.path(), 4, 64);

    let report = IndexBuilder::new(&cfg, &source, &EnglishAnalyzer).run().unwrap();
    assert_eq!(report.blocks.len(), 4);
    assert!(report.merge.flushes > 1);

    let paths = IndexPaths::new(dir.path());
    for block in 1..=4 {
        let records = read_records(&paths.block(block));
        assert!(records.windows(2).all(|w| w[0].term < w[1].term), "block {block} out of term order");
    }

    let merged = read_records(&paths.merged_index());
    assert!(merged.windows(2).all(|w| w[0].term < w[1].term));
    for record in &merged {
        assert!(record.postings.windows(2).all(|w| w[0].doc_id < w[1].doc_id), "{}", record.term);
    }

    let actual: BTreeMap<String, Vec<Posting>> = merged.into_iter().map(|r| (r.term, r.postings)).collect();
    assert_eq!(actual, expected_postings(&source));

    let meta = load_meta(&paths).unwrap();
    assert_eq!(meta.num_blocks, 4);
    assert_eq!(meta.num_terms, actual.len());
}

#[test]
fn block_size_does_not_change_the_merged_index() {
    let source = MemorySource::from_texts(CORPUS.iter().copied());
    let mut outputs = Vec::new();
    for (capacity, flush) in [(1, 10), (2, 1_000_000), (5, 200), (13, 100_000), (100, 1)] {
        let dir = tempfile::tempdir().unwrap();
        IndexBuilder::new(&config(dir.path(), capacity, flush), &source, &EnglishAnalyzer).run().unwrap();
        outputs.push(std::fs::read(IndexPaths::new(dir.path()).merged_index()).unwrap());
    }
    assert!(outputs.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn compressed_and_uncompressed_models_agree() {
    let dir = tempfile::tempdir().unwrap();
    let source = MemorySource::from_texts(CORPUS.iter().copied());
    IndexBuilder::new(&config(dir.path(), 3, 100), &source, &EnglishAnalyzer).run().unwrap();

    let path = IndexPaths::new(dir.path()).merged_index();
    let plain = UncompressedIndex::load(&path).unwrap();
    let packed = CompressedIndex::load(&path).unwrap();
    assert_eq!(plain.num_terms(), packed.num_terms());
    for record in read_records(&path) {
        let ids: Vec<DocId> = record.doc_ids().collect();
        assert_eq!(plain.lookup(&record.term), ids);
        assert_eq!(packed.lookup(&record.term), ids, "{}", record.term);
    }
    for absent in ["zebra", "aardvark", "brid", "bridgez"] {
        assert!(plain.lookup(absent).is_empty());
        assert!(packed.lookup(absent).is_empty());
    }
}

#[test]
fn missing_document_aborts_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let source = MemorySource::from_texts(CORPUS.iter().copied());
    let mut cfg = config(dir.path(), 5, 100);
    cfg.num_documents += 1;

    let err = IndexBuilder::new(&cfg, &source, &EnglishAnalyzer).run().unwrap_err();
    assert!(matches!(err, IndexError::DocumentNotFound(14)));
    let paths = IndexPaths::new(dir.path());
    assert!(!paths.block(3).exists());
    assert!(!paths.merged_index().exists());
}

#[test]
fn blocks_can_be_discarded_after_merge() {
    let dir = tempfile::tempdir().unwrap();
    let source = MemorySource::from_texts(CORPUS.iter().copied());
    let cfg = IndexConfig { keep_blocks: false, ..config(dir.path(), 5, 100) };
    IndexBuilder::new(&cfg, &source, &EnglishAnalyzer).run().unwrap();

    let paths = IndexPaths::new(dir.path());
    assert!(!paths.block(1).exists());
    assert!(paths.merged_index().exists());
}

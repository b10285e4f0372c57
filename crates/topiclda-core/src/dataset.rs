//! Read-only bag-of-words corpus.
//!
//! Wire format: a 3-line header (`M`, `V`, `N`) followed by whitespace
//! separated `m v cnt` triples, each meaning "document `m` (1-based)
//! contains `cnt` occurrences of vocabulary word `v` (1-based)". Indices
//! are converted to 0-based on load; nothing else is computed here.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// An immutable, loaded corpus.
#[derive(Debug, Clone)]
pub struct DataSet {
    /// Number of documents.
    m: usize,
    /// Vocabulary size.
    v: usize,
    /// Total token count across all documents.
    n: usize,
    /// `docs[j]` is the ordered sequence of 0-based vocabulary indices for document `j`.
    docs: Vec<Vec<usize>>,
    /// `n_m[j] == docs[j].len()`, cached for the hot loops that need it often.
    n_m: Vec<usize>,
    /// Surface forms, 0-based index -> word. Absent when no vocabulary file was given.
    vocab: Option<Vec<String>>,
}

impl DataSet {
    /// Load a corpus from `path`, with no vocabulary attached.
    ///
    /// # Errors
    /// Returns [`EngineError::Io`] if the file can't be opened, or
    /// [`EngineError::Parse`] if the header or a record is malformed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        Self::load_with_vocab_opt(path, None::<&Path>)
    }

    /// Load a corpus from `path` together with a vocabulary file.
    ///
    /// # Errors
    /// Returns [`EngineError::Io`] if either file can't be opened, or
    /// [`EngineError::Parse`] if the header, a record, or the vocabulary is malformed.
    pub fn load_with_vocab<P: AsRef<Path>, Q: AsRef<Path>>(
        path: P,
        vocab_path: Q,
    ) -> Result<Self, EngineError> {
        Self::load_with_vocab_opt(path, Some(vocab_path))
    }

    fn load_with_vocab_opt<P: AsRef<Path>, Q: AsRef<Path>>(
        path: P,
        vocab_path: Option<Q>,
    ) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let mut ds = parse_dataset(path)?;
        if let Some(vp) = vocab_path {
            let vp = vp.as_ref();
            ds.vocab = Some(parse_vocab(vp)?);
            if let Some(vocab) = &ds.vocab {
                if vocab.len() < ds.v {
                    tracing::warn!(
                        vocab_len = vocab.len(),
                        declared_v = ds.v,
                        "vocabulary file shorter than declared V; topic dumps will fall back \
                         to numeric labels for indices beyond the vocabulary file"
                    );
                }
            }
        }
        Ok(ds)
    }

    /// Number of documents (`M`).
    #[must_use]
    pub fn m(&self) -> usize {
        self.m
    }

    /// Vocabulary size (`V`).
    #[must_use]
    pub fn v(&self) -> usize {
        self.v
    }

    /// Total token count (`N`).
    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Token count of document `j`.
    #[must_use]
    pub fn n_m(&self, j: usize) -> usize {
        self.n_m[j]
    }

    /// The ordered, 0-based vocabulary indices of document `j`.
    #[must_use]
    pub fn doc(&self, j: usize) -> &[usize] {
        &self.docs[j]
    }

    /// All documents, in file order.
    #[must_use]
    pub fn docs(&self) -> &[Vec<usize>] {
        &self.docs
    }

    /// Surface form for vocabulary index `v`, or a numeric placeholder when
    /// no vocabulary file was loaded (or the index falls outside it).
    #[must_use]
    pub fn word(&self, v: usize) -> String {
        match &self.vocab {
            Some(words) if v < words.len() => words[v].clone(),
            _ => format!("word#{v}"),
        }
    }
}

fn parse_dataset(path: &Path) -> Result<DataSet, EngineError> {
    let file = File::open(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut lines = BufReader::new(file).lines();

    let m = read_header_int(path, &mut lines, 1, "document count M")?;
    let v = read_header_int(path, &mut lines, 2, "vocabulary size V")?;
    let n = read_header_int(path, &mut lines, 3, "token count N")?;

    let mut docs = vec![Vec::new(); m];
    let mut n_m = vec![0usize; m];

    // Records are whitespace-separated `m v cnt` triples; like the reference
    // loader's `while (fin >> m >> v >> cnt)`, line breaks are not significant
    // once past the 3-line header, so the remaining body is one flat token
    // stream grouped into triples.
    let mut fields: Vec<String> = Vec::new();
    let mut line_no = 3usize;
    for line in lines {
        line_no += 1;
        let line = line.map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        for tok in line.split_whitespace() {
            fields.push(tok.to_string());
        }
    }

    if fields.len() % 3 != 0 {
        return Err(EngineError::Parse {
            path: path.to_path_buf(),
            line: line_no,
            message: format!(
                "trailing incomplete record: {} fields after the header, not a multiple of 3",
                fields.len()
            ),
        });
    }

    for triple in fields.chunks(3) {
        let doc_id = parse_record_int(path, &triple[0])?;
        let word_id = parse_record_int(path, &triple[1])?;
        let cnt = parse_record_int(path, &triple[2])?;

        if doc_id == 0 || doc_id > m {
            return Err(EngineError::Parse {
                path: path.to_path_buf(),
                line: line_no,
                message: format!("document id {doc_id} out of range [1,{m}]"),
            });
        }
        if word_id == 0 || word_id > v {
            return Err(EngineError::Parse {
                path: path.to_path_buf(),
                line: line_no,
                message: format!("vocabulary id {word_id} out of range [1,{v}]"),
            });
        }

        let j = doc_id - 1;
        let w = word_id - 1;
        for _ in 0..cnt {
            docs[j].push(w);
            n_m[j] += 1;
        }
    }

    let total: usize = n_m.iter().sum();
    if total != n {
        return Err(EngineError::Parse {
            path: path.to_path_buf(),
            line: line_no,
            message: format!("header declared N={n} tokens but records sum to {total}"),
        });
    }

    Ok(DataSet {
        m,
        v,
        n,
        docs,
        n_m,
        vocab: None,
    })
}

fn parse_record_int(path: &Path, field: &str) -> Result<usize, EngineError> {
    field.parse::<usize>().map_err(|_| EngineError::Parse {
        path: path.to_path_buf(),
        line: 0,
        message: format!("expected a non-negative integer, got `{field}`"),
    })
}

fn read_header_int(
    path: &Path,
    lines: &mut std::io::Lines<BufReader<File>>,
    line_no: usize,
    what: &str,
) -> Result<usize, EngineError> {
    let line = lines
        .next()
        .ok_or_else(|| EngineError::Parse {
            path: path.to_path_buf(),
            line: line_no,
            message: format!("missing header line for {what}"),
        })?
        .map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    line.trim().parse::<usize>().map_err(|_| EngineError::Parse {
        path: path.to_path_buf(),
        line: line_no,
        message: format!("expected an integer for {what}, got `{}`", line.trim()),
    })
}

fn parse_vocab(path: &Path) -> Result<Vec<String>, EngineError> {
    let file = File::open(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut words = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        for tok in line.split_whitespace() {
            words.push(tok.to_string());
        }
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("corpus.txt");
        let mut f = File::create(&path).expect("create");
        f.write_all(contents.as_bytes()).expect("write");
        (dir, path)
    }

    #[test]
    fn loads_simple_corpus() {
        let (_dir, path) = write_temp("2\n3\n6\n1 1 2\n1 2 1\n2 2 1\n2 3 2\n");
        let ds = DataSet::load(&path).expect("load");
        assert_eq!(ds.m(), 2);
        assert_eq!(ds.v(), 3);
        assert_eq!(ds.n(), 6);
        assert_eq!(ds.doc(0), &[0, 0, 1]);
        assert_eq!(ds.doc(1), &[1, 2, 2]);
        assert_eq!(ds.n_m(0), 3);
        assert_eq!(ds.n_m(1), 3);
    }

    #[test]
    fn rejects_mismatched_total() {
        let (_dir, path) = write_temp("1\n2\n5\n1 1 1\n");
        let err = DataSet::load(&path).unwrap_err();
        assert!(matches!(err, EngineError::Parse { .. }));
    }

    #[test]
    fn rejects_out_of_range_ids() {
        let (_dir, path) = write_temp("1\n1\n1\n1 2 1\n");
        let err = DataSet::load(&path).unwrap_err();
        assert!(matches!(err, EngineError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = DataSet::load("/nonexistent/path/to/corpus.txt").unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }

    #[test]
    fn loads_vocabulary() {
        let (_dir, path) = write_temp("1\n2\n2\n1 1 1\n1 2 1\n");
        let dir = tempfile::tempdir().expect("tempdir");
        let vpath = dir.path().join("vocab.txt");
        std::fs::write(&vpath, "alpha beta\n").expect("write vocab");

        let ds = DataSet::load_with_vocab(&path, &vpath).expect("load");
        assert_eq!(ds.word(0), "alpha");
        assert_eq!(ds.word(1), "beta");
    }

    #[test]
    fn falls_back_to_numeric_label_without_vocab() {
        let (_dir, path) = write_temp("1\n1\n1\n1 1 1\n");
        let ds = DataSet::load(&path).expect("load");
        assert_eq!(ds.word(0), "word#0");
    }
}

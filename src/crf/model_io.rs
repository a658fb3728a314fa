//! Binary model format
//!
//! ```text
//! header      magic "sCRF", size, version, num_features, num_labels,
//!             num_attrs, off_features, off_labels, off_attrs, off_meta
//! features    "FEAT", chunk size, count, then (type, src, dst, weight)
//! labels      CQDB label dictionary
//! attrs       CQDB feature-string dictionary
//! meta        "META", language, extraction options, training metadata
//! ```
//!
//! Features with a zero weight are dropped on write, and so are feature
//! strings left without any feature.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use bstr::ByteSlice;
use cqdb::{CQDBWriter, CQDB};

use super::feature_gen::{Feature, FeatureGenerator, FeatureType};
use super::{CrfModel, Metadata};
use crate::codec::{Decoder, Encoder};
use crate::dictionary::Dictionary;
use crate::errors::{Error, Result};
use crate::features::{ExtractOptions, Families};
use crate::optim::StopReason;

const MAGIC: &[u8; 4] = b"sCRF";
const VERSION: u32 = 1;
const HEADER_SIZE: usize = 40;
const CHUNK_SIZE: usize = 12;
const FEATURE_SIZE: usize = 20;

/// Non-zero features with attribute ids remapped onto the surviving attributes
struct Pruned {
    features: Vec<Feature>,
    weights: Vec<f64>,
    attrs: Dictionary,
}

impl Pruned {
    fn from_model(model: &CrfModel) -> Self {
        let fgen = &model.fgen;
        let mut amap: Vec<Option<u32>> = vec![None; model.attrs.len()];
        let mut attrs = Dictionary::new();
        let mut features = Vec::new();
        let mut weights = Vec::new();
        for (f, &w) in fgen.features.iter().zip(&fgen.weights) {
            if w == 0.0 {
                continue;
            }
            let mut f = *f;
            if f.ftype == FeatureType::State {
                let slot = match amap.get_mut(f.src as usize) {
                    Some(slot) => slot,
                    None => continue,
                };
                f.src = match *slot {
                    Some(aid) => aid,
                    None => {
                        let name = model.attrs.get_name(f.src).unwrap_or_default();
                        let aid = attrs.get_or_insert(name);
                        *slot = Some(aid);
                        aid
                    }
                };
            }
            features.push(f);
            weights.push(w);
        }
        Self {
            features,
            weights,
            attrs,
        }
    }
}

fn to_u32(v: usize) -> Result<u32> {
    u32::try_from(v).map_err(|_| Error::invalid_model("model exceeds 4 GiB"))
}

fn write_cqdb(enc: &mut Encoder, dict: &Dictionary) -> Result<()> {
    let mut cursor = Cursor::new(std::mem::take(&mut enc.buf));
    cursor.set_position(cursor.get_ref().len() as u64);
    {
        // The database is flushed when the writer is dropped
        let mut writer = CQDBWriter::new(&mut cursor)?;
        for (s, id) in dict.iter() {
            writer.put(s, id)?;
        }
    }
    enc.buf = cursor.into_inner();
    Ok(())
}

fn read_cqdb(buf: &[u8], offset: usize, count: u32, what: &str) -> Result<Dictionary> {
    let mut dict = Dictionary::new();
    if count == 0 {
        return Ok(dict);
    }
    let db = buf
        .get(offset..)
        .ok_or_else(|| Error::invalid_model(format!("{} offset out of range", what)))?;
    let db = CQDB::new(db)?;
    for id in 0..count {
        let name = db
            .to_str(id)
            .and_then(|s| s.to_str().ok())
            .ok_or_else(|| Error::invalid_model(format!("missing {} #{}", what, id)))?;
        dict.get_or_insert(name);
    }
    if dict.len() != count as usize {
        return Err(Error::invalid_model(format!("duplicate {} entries", what)));
    }
    Ok(dict)
}

impl CrfModel {
    /// Serialize the model.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let pruned = Pruned::from_model(self);
        let mut enc = Encoder::new();
        enc.bytes(&[0; HEADER_SIZE]);

        let off_features = to_u32(enc.len())?;
        enc.bytes(b"FEAT");
        enc.u32(to_u32(CHUNK_SIZE + FEATURE_SIZE * pruned.features.len())?);
        enc.u32(to_u32(pruned.features.len())?);
        for (f, &w) in pruned.features.iter().zip(&pruned.weights) {
            enc.u32(f.ftype as u32);
            enc.u32(f.src);
            enc.u32(f.dst);
            enc.f64(w);
        }

        let off_labels = to_u32(enc.len())?;
        write_cqdb(&mut enc, &self.labels)?;
        let off_attrs = to_u32(enc.len())?;
        write_cqdb(&mut enc, &pruned.attrs)?;

        enc.align();
        let off_meta = to_u32(enc.len())?;
        enc.bytes(b"META");
        enc.opt_str(self.language.as_deref())?;
        enc.u32(self.extract.families().bits());
        enc.u32(to_u32(self.extract.max_affix_len())?);
        match &self.metadata {
            Some(meta) => {
                enc.u32(1);
                enc.u64(meta.training_size as u64);
                enc.u64(meta.iterations as u64);
                enc.f64(meta.final_loss);
                enc.u32(meta.stop_reason.to_u32());
                enc.f64s(&meta.loss_history)?;
                enc.u64(meta.trained_at);
            }
            None => enc.u32(0),
        }

        let size = to_u32(enc.len())?;
        let header = [
            size,
            VERSION,
            to_u32(pruned.features.len())?,
            to_u32(self.labels.len())?,
            to_u32(pruned.attrs.len())?,
            off_features,
            off_labels,
            off_attrs,
            off_meta,
        ];
        enc.buf[0..4].copy_from_slice(MAGIC);
        for (i, v) in header.iter().enumerate() {
            enc.patch_u32(4 + 4 * i, *v);
        }
        Ok(enc.buf)
    }

    /// Deserialize a model written by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::invalid_model("invalid model format"));
        }
        let mut dec = Decoder::new(buf);
        let magic = dec.bytes(4)?;
        if magic != MAGIC {
            return Err(Error::invalid_model("invalid file format, magic mismatch"));
        }
        let size = dec.u32()? as usize;
        let version = dec.u32()?;
        if version != VERSION {
            return Err(Error::invalid_model(format!(
                "unsupported version {} (expected {})",
                version, VERSION
            )));
        }
        if size != buf.len() {
            return Err(Error::invalid_model("truncated model"));
        }
        let num_features = dec.u32()?;
        let num_labels = dec.u32()?;
        let num_attrs = dec.u32()?;
        let off_features = dec.u32()? as usize;
        let off_labels = dec.u32()? as usize;
        let off_attrs = dec.u32()? as usize;
        let off_meta = dec.u32()? as usize;

        let mut dec = Decoder::at(buf, off_features)?;
        if dec.bytes(4)? != b"FEAT" {
            return Err(Error::invalid_model("missing feature chunk"));
        }
        dec.u32()?;
        if dec.u32()? != num_features {
            return Err(Error::invalid_model("feature count mismatch"));
        }
        let mut features = Vec::with_capacity(num_features as usize);
        let mut weights = Vec::with_capacity(num_features as usize);
        for _ in 0..num_features {
            let ftype = FeatureType::from_u32(dec.u32()?)
                .ok_or_else(|| Error::invalid_model("unknown feature type"))?;
            let src = dec.u32()?;
            let dst = dec.u32()?;
            features.push(Feature { ftype, src, dst });
            weights.push(dec.f64()?);
        }

        let labels = read_cqdb(buf, off_labels, num_labels, "label")?;
        let attrs = read_cqdb(buf, off_attrs, num_attrs, "attribute")?;
        let fgen = FeatureGenerator::from_features(features, weights, attrs.len(), labels.len())?;

        let mut dec = Decoder::at(buf, off_meta)?;
        if dec.bytes(4)? != b"META" {
            return Err(Error::invalid_model("missing metadata chunk"));
        }
        let language = dec.opt_str()?;
        let mut extract = ExtractOptions::default();
        extract.set_families(Families::from_bits_truncate(dec.u32()?));
        extract
            .set_max_affix_len(dec.u32()? as usize)
            .map_err(|e| Error::invalid_model(e.to_string()))?;
        let metadata = match dec.u32()? {
            0 => None,
            _ => Some(Metadata {
                training_size: dec.u64()? as usize,
                iterations: dec.u64()? as usize,
                final_loss: dec.f64()?,
                stop_reason: StopReason::from_u32(dec.u32()?)
                    .ok_or_else(|| Error::invalid_model("unknown stop reason"))?,
                loss_history: dec.f64s()?,
                trained_at: dec.u64()?,
            }),
        };

        Ok(Self {
            labels,
            attrs,
            fgen,
            language,
            extract,
            metadata,
        })
    }

    /// Write the model to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Read a model from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let buf = fs::read(path)?;
        Self::from_bytes(&buf)
    }

    /// Print the model in human-readable format
    pub fn dump<W: Write>(&self, w: &mut W) -> Result<()> {
        writeln!(w, "LABELS = {{")?;
        for (label, id) in self.labels.iter() {
            writeln!(w, "  {:>5}: {}", id, label)?;
        }
        writeln!(w, "}}\n")?;

        writeln!(w, "TRANSITIONS = {{")?;
        for (f, &weight) in self.fgen.features.iter().zip(&self.fgen.weights) {
            if f.ftype == FeatureType::Transition && weight != 0.0 {
                writeln!(
                    w,
                    "  ({}) {} --> {}: {:.6}",
                    FeatureType::Transition as u32,
                    self.label_name(f.src),
                    self.label_name(f.dst),
                    weight
                )?;
            }
        }
        writeln!(w, "}}\n")?;

        writeln!(w, "STATE_FEATURES = {{")?;
        for (f, &weight) in self.fgen.features.iter().zip(&self.fgen.weights) {
            if f.ftype == FeatureType::State && weight != 0.0 {
                writeln!(
                    w,
                    "  ({}) {} --> {}: {:.6}",
                    FeatureType::State as u32,
                    self.attrs.get_name(f.src).unwrap_or_default(),
                    self.label_name(f.dst),
                    weight
                )?;
            }
        }
        writeln!(w, "}}")?;
        Ok(())
    }
}

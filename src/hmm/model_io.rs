use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2, Array3};

use super::{HmmMetadata, HmmParams, HmmTagger, Tables};
use crate::codec::{Decoder, Encoder};
use crate::dictionary::Dictionary;
use crate::errors::{Error, Result};

const MAGIC: &[u8; 4] = b"sHMM";
const VERSION: u32 = 1;

fn write_dict(enc: &mut Encoder, dict: &Dictionary) -> Result<()> {
    enc.len_u32(dict.len())?;
    for (s, _) in dict.iter() {
        enc.str(s)?;
    }
    Ok(())
}

fn read_dict(dec: &mut Decoder<'_>) -> Result<Dictionary> {
    let len = dec.u32()?;
    let mut dict = Dictionary::new();
    for _ in 0..len {
        dict.get_or_insert(&dec.str()?);
    }
    if dict.len() != len as usize {
        return Err(Error::invalid_model("duplicate dictionary entries"));
    }
    Ok(dict)
}

fn read_table(dec: &mut Decoder<'_>, expected: usize) -> Result<Vec<f64>> {
    let values = dec.f64s()?;
    if values.len() != expected {
        return Err(Error::invalid_model("probability table has the wrong size"));
    }
    Ok(values)
}

impl HmmTagger {
    /// Serialize the tagger.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        enc.bytes(MAGIC);
        enc.u32(VERSION);
        enc.f64(self.params.smoothing());
        enc.u32(self.params.lowercase() as u32);
        write_dict(&mut enc, &self.tags)?;
        write_dict(&mut enc, &self.words)?;
        match &self.tables {
            Some(tables) => {
                enc.u32(1);
                enc.f64s(&tables.initial.to_vec())?;
                enc.f64s(&tables.emission.iter().copied().collect::<Vec<_>>())?;
                enc.f64s(&tables.unseen.to_vec())?;
                enc.f64s(&tables.transition.iter().copied().collect::<Vec<_>>())?;
            }
            None => enc.u32(0),
        }
        match &self.metadata {
            Some(meta) => {
                enc.u32(1);
                enc.u64(meta.training_size as u64);
                enc.u64(meta.num_tokens as u64);
                enc.u64(meta.trained_at);
            }
            None => enc.u32(0),
        }
        Ok(enc.buf)
    }

    /// Deserialize a tagger written by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(buf);
        dec.header(MAGIC, VERSION)?;
        let mut params = HmmParams::default();
        params
            .set_smoothing(dec.f64()?)
            .map_err(|e| Error::invalid_model(e.to_string()))?;
        params.set_lowercase(dec.u32()? != 0);
        let tags = read_dict(&mut dec)?;
        let words = read_dict(&mut dec)?;
        let (t, v) = (tags.len(), words.len());

        let tables = match dec.u32()? {
            0 => None,
            _ => {
                let initial = Array1::from(read_table(&mut dec, t)?);
                let emission = Array2::from_shape_vec((v, t), read_table(&mut dec, v * t)?)
                    .map_err(|e| Error::invalid_model(e.to_string()))?;
                let unseen = Array1::from(read_table(&mut dec, t)?);
                let transition = Array3::from_shape_vec(
                    (t + 1, t + 1, t),
                    read_table(&mut dec, (t + 1) * (t + 1) * t)?,
                )
                .map_err(|e| Error::invalid_model(e.to_string()))?;
                Some(Tables {
                    initial,
                    emission,
                    unseen,
                    transition,
                })
            }
        };
        let metadata = match dec.u32()? {
            0 => None,
            _ => Some(HmmMetadata {
                training_size: dec.u64()? as usize,
                num_tokens: dec.u64()? as usize,
                trained_at: dec.u64()?,
            }),
        };

        Ok(Self {
            params,
            tags,
            words,
            tables,
            metadata,
        })
    }

    /// Write the tagger to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Read a tagger from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let buf = fs::read(path)?;
        Self::from_bytes(&buf)
    }
}

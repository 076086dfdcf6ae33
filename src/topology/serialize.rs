//! Binary checkpoint of a topology.
//!
//! All integers are little-endian:
//!
//! ```text
//! u32 num_domains
//! u32 num_dimensions                      (the top dimension)
//! u64 entity count   for domain, for dim in 0..=top
//! for from_domain, to_domain, from_dim, to_dim:
//!     u64 n, n × u64 target ids
//!     u64 k, k × u64 offsets              (k == 0: not computed)
//! ```
//!
//! Entity payloads are not stored; [`unserialize`](MeshTopology::unserialize)
//! recreates them through `MeshPolicy::create_entity`.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::debug;

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshTopologyError;
use crate::topology::connectivity::Connectivity;
use crate::topology::context::MeshContext;
use crate::topology::id::EntityId;
use crate::topology::mesh::MeshTopology;
use crate::topology::policy::MeshPolicy;

/// Parsed but not yet committed contents of a buffer.
struct Decoded {
    counts: Vec<Vec<usize>>,
    /// `(from_domain, to_domain, from_dim, to_dim, table)` of computed tables.
    tables: Vec<(usize, usize, usize, usize, Connectivity)>,
}

/// Bounds-checked little-endian reader.
struct Reader<'a> {
    buf: &'a [u8],
    total: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            total: buf.len(),
        }
    }

    fn require(&self, needed: usize) -> Result<(), MeshTopologyError> {
        if self.buf.remaining() < needed {
            return Err(MeshTopologyError::Truncated {
                offset: self.total - self.buf.remaining(),
                needed,
                available: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn u32(&mut self) -> Result<u32, MeshTopologyError> {
        self.require(4)?;
        Ok(self.buf.get_u32_le())
    }

    fn u64(&mut self) -> Result<u64, MeshTopologyError> {
        self.require(8)?;
        Ok(self.buf.get_u64_le())
    }

    fn usize(&mut self) -> Result<usize, MeshTopologyError> {
        let v = self.u64()?;
        usize::try_from(v)
            .map_err(|_| MeshTopologyError::CorruptBuffer(format!("{v} does not fit in usize")))
    }

    /// A length-prefixed run of `u64`s.
    fn run(&mut self) -> Result<Vec<u64>, MeshTopologyError> {
        let n = self.usize()?;
        let bytes = n.checked_mul(8).ok_or_else(|| {
            MeshTopologyError::CorruptBuffer(format!("run length {n} overflows"))
        })?;
        self.require(bytes)?;
        Ok((0..n).map(|_| self.buf.get_u64_le()).collect())
    }
}

fn put_ids(out: &mut BytesMut, ids: &[EntityId]) {
    out.put_u64_le(ids.len() as u64);
    if cfg!(target_endian = "little") {
        out.put_slice(bytemuck::cast_slice(ids));
    } else {
        for id in ids {
            out.put_u64_le(id.raw());
        }
    }
}

impl<P: MeshPolicy> MeshTopology<P> {
    /// Encode entity counts and every table, computed or not.
    pub fn serialize(&self) -> Bytes {
        let top = P::NUM_DIMENSIONS;
        let mut out = BytesMut::with_capacity(self.config.serialize_block_size);
        out.put_u32_le(P::NUM_DOMAINS as u32);
        out.put_u32_le(top as u32);
        for domain in 0..P::NUM_DOMAINS {
            for dim in 0..=top {
                out.put_u64_le(self.num_entities(dim, domain) as u64);
            }
        }
        for row in &self.topology {
            for dc in row {
                for (_, _, c) in dc.iter() {
                    put_ids(&mut out, c.to_ids());
                    out.put_u64_le(c.offsets().len() as u64);
                    for &o in c.offsets() {
                        out.put_u64_le(o as u64);
                    }
                }
            }
        }
        debug!("serialized topology into {} bytes", out.len());
        out.freeze()
    }

    fn decode(buf: &[u8]) -> Result<Decoded, MeshTopologyError> {
        let top = P::NUM_DIMENSIONS;
        let mut r = Reader::new(buf);
        let domains = r.u32()? as usize;
        if domains != P::NUM_DOMAINS {
            return Err(MeshTopologyError::DomainMismatch {
                expected: P::NUM_DOMAINS,
                found: domains,
            });
        }
        let dims = r.u32()? as usize;
        if dims != top {
            return Err(MeshTopologyError::DimensionMismatch {
                expected: top,
                found: dims,
            });
        }

        let mut counts = vec![vec![0; top + 1]; P::NUM_DOMAINS];
        for per_domain in counts.iter_mut() {
            for n in per_domain.iter_mut() {
                *n = r.usize()?;
                if *n > EntityId::MAX_ENTITY + 1 {
                    return Err(MeshTopologyError::CorruptBuffer(format!(
                        "entity count {n} exceeds the id space"
                    )));
                }
            }
        }

        let mut tables = Vec::new();
        for fm in 0..P::NUM_DOMAINS {
            for tm in 0..P::NUM_DOMAINS {
                for fd in 0..=top {
                    for td in 0..=top {
                        let ids = r.run()?;
                        let offsets = r.run()?;
                        if offsets.is_empty() {
                            if !ids.is_empty() {
                                return Err(MeshTopologyError::CorruptBuffer(format!(
                                    "table {fm}:{tm} {fd}->{td} has targets but no offsets"
                                )));
                            }
                            continue;
                        }
                        let offsets = offsets
                            .into_iter()
                            .map(|o| {
                                usize::try_from(o).map_err(|_| {
                                    MeshTopologyError::CorruptBuffer(format!("offset {o} too large"))
                                })
                            })
                            .collect::<Result<Vec<_>, _>>()?;
                        let ids: Vec<EntityId> = ids.into_iter().map(EntityId::from_raw).collect();
                        if let Some(bad) = ids.iter().find(|id| {
                            id.domain() != tm || id.dimension() != td || id.entity() >= counts[tm][td]
                        }) {
                            return Err(MeshTopologyError::CorruptBuffer(format!(
                                "table {fm}:{tm} {fd}->{td} references {bad:?}"
                            )));
                        }
                        let mut c = Connectivity::new();
                        c.set_raw(offsets, ids).map_err(|e| {
                            MeshTopologyError::CorruptBuffer(format!("table {fm}:{tm} {fd}->{td}: {e}"))
                        })?;
                        if c.from_size() > counts[fm][fd] {
                            return Err(MeshTopologyError::CorruptBuffer(format!(
                                "table {fm}:{tm} {fd}->{td} has {} rows for {} entities",
                                c.from_size(),
                                counts[fm][fd]
                            )));
                        }
                        tables.push((fm, tm, fd, td, c));
                    }
                }
            }
        }
        if r.buf.has_remaining() {
            return Err(MeshTopologyError::CorruptBuffer(format!(
                "{} trailing bytes",
                r.buf.remaining()
            )));
        }
        Ok(Decoded { counts, tables })
    }

    /// Restore a topology written by [`serialize`](Self::serialize) into this
    /// freshly constructed one.
    ///
    /// The whole buffer is validated before anything is committed; on error
    /// the topology is left untouched.
    pub fn unserialize<C: MeshContext + ?Sized>(
        &mut self,
        ctx: &C,
        buf: &[u8],
    ) -> Result<(), MeshTopologyError> {
        let computed = self
            .topology
            .iter()
            .flatten()
            .any(|dc| dc.iter().any(|(_, _, c)| !c.is_empty()));
        if computed || !self.has_no_entities() {
            return Err(MeshTopologyError::TargetNotEmpty);
        }
        let Decoded { counts, tables } = Self::decode(buf)?;
        let color = ctx.color();
        let mut spaces = Vec::new();
        for (domain, per_domain) in counts.iter().enumerate() {
            for (dim, &n) in per_domain.iter().enumerate() {
                let to_vertices = tables
                    .iter()
                    .find(|&&(fm, tm, fd, td, _)| fm == domain && tm == domain && fd == dim && td == 0)
                    .map(|(.., c)| c);
                let mut entities: Vec<Box<P::Entity>> = Vec::new();
                let mut ids: Vec<EntityId> = Vec::new();
                entities
                    .try_reserve_exact(n)
                    .and_then(|_| ids.try_reserve_exact(n))
                    .map_err(|e| {
                        MeshTopologyError::CorruptBuffer(format!(
                            "cannot hold {n} entities of dimension {dim} in domain {domain}: {e}"
                        ))
                    })?;
                for i in 0..n {
                    let id = EntityId::try_new(dim, domain, i, color)?;
                    let num_vertices = match (dim, to_vertices) {
                        (0, _) => 1,
                        (_, Some(c)) if i < c.from_size() => c.count(i),
                        _ => 0,
                    };
                    entities.push(Box::new(self.policy.create_entity(domain, dim, id, num_vertices)));
                    ids.push(id);
                }
                spaces.push((domain, dim, entities, ids));
            }
        }
        for (fm, tm, fd, td, c) in tables {
            *self.conn_mut(fm, tm, fd, td) = c;
        }
        for (domain, dim, entities, ids) in spaces {
            self.append_to_index_space(domain, dim, entities, ids)?;
        }
        self.debug_assert_invariants();
        debug!("unserialized topology from {} bytes", buf.len());
        Ok(())
    }

    /// Write the serialized topology prefixed with its `u64` byte length.
    pub fn save<W: Write>(&self, out: &mut W) -> Result<(), MeshTopologyError> {
        let data = self.serialize();
        out.write_all(&(data.len() as u64).to_le_bytes())?;
        out.write_all(&data)?;
        Ok(())
    }

    /// Read a payload written by [`save`](Self::save) and unserialize it.
    pub fn load<R: Read, C: MeshContext + ?Sized>(
        &mut self,
        ctx: &C,
        input: &mut R,
    ) -> Result<(), MeshTopologyError> {
        let mut len = [0u8; 8];
        input.read_exact(&mut len)?;
        let len = u64::from_le_bytes(len);
        let mut data = Vec::new();
        let read = Read::take(input, len).read_to_end(&mut data)?;
        if (read as u64) < len {
            return Err(MeshTopologyError::Truncated {
                offset: 8 + read,
                needed: (len - read as u64) as usize,
                available: 0,
            });
        }
        self.unserialize(ctx, &data)
    }
}

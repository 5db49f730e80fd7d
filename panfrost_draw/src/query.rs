/// Occlusion and primitive-count queries
///
/// Occlusion queries are written by the GPU into a small BO referenced by
/// every draw while the query is active. Primitive counts are tracked on the
/// CPU by the dispatcher.

use std::sync::Arc;
use crate::context::{Context, QueryKey};
use crate::device::{Bo, BoDesc, BoFlags};
use crate::error::Result;
use crate::{pan_trace, pan_warn};

/// Kind of query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    OcclusionCounter,
    OcclusionPredicate,
    OcclusionPredicateConservative,
    PrimitivesGenerated,
    PrimitivesEmitted,
    Timestamp,
    TimeElapsed,
}

impl QueryType {
    pub fn is_occlusion(self) -> bool {
        matches!(
            self,
            QueryType::OcclusionCounter | QueryType::OcclusionPredicate | QueryType::OcclusionPredicateConservative
        )
    }
}

/// Value read back from a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResult {
    U64(u64),
    Bool(bool),
}

#[derive(Debug)]
pub struct Query {
    pub query_type: QueryType,
    /// Sample counter written by the GPU (occlusion queries, after the first begin)
    pub bo: Option<Arc<dyn Bo>>,
    pub start: u64,
    pub end: u64,
}

impl Context {
    pub fn create_query(&mut self, query_type: QueryType) -> QueryKey {
        self.queries.insert(Query { query_type, bo: None, start: 0, end: 0 })
    }

    pub fn destroy_query(&mut self, query: QueryKey) {
        if self.occlusion_query == Some(query) {
            self.occlusion_query = None;
        }
        self.queries.remove(query);
    }

    pub fn query(&self, query: QueryKey) -> &Query {
        &self.queries[query]
    }

    /// Start counting
    ///
    /// An occlusion query gets its result BO zeroed and becomes the one
    /// draws report to.
    pub fn begin_query(&mut self, key: QueryKey) -> Result<()> {
        let query_type = self.queries[key].query_type;

        match query_type {
            QueryType::OcclusionCounter | QueryType::OcclusionPredicate | QueryType::OcclusionPredicateConservative => {
                if self.queries[key].bo.is_none() {
                    let bo = self.allocator.create_bo(BoDesc {
                        size: std::mem::size_of::<u32>() as u64,
                        flags: BoFlags::empty(),
                        label: "occlusion query",
                    })?;
                    self.queries[key].bo = Some(bo);
                }

                // Nothing drawn reads back as zero
                if let Some(bo) = &self.queries[key].bo {
                    bo.write(0, &0u32.to_le_bytes())?;
                }
                self.occlusion_query = Some(key);
            }
            QueryType::PrimitivesGenerated => self.queries[key].start = self.prims_generated,
            QueryType::PrimitivesEmitted => self.queries[key].start = self.tf_prims_generated,
            QueryType::Timestamp | QueryType::TimeElapsed => {
                pan_warn!("pan::Query", "{:?} queries are not supported", query_type);
            }
        }

        pan_trace!("pan::Query", "Begin {:?}", query_type);
        Ok(())
    }

    pub fn end_query(&mut self, key: QueryKey) {
        let query_type = self.queries[key].query_type;

        match query_type {
            QueryType::OcclusionCounter | QueryType::OcclusionPredicate | QueryType::OcclusionPredicateConservative => {
                self.occlusion_query = None;
            }
            QueryType::PrimitivesGenerated => self.queries[key].end = self.prims_generated,
            QueryType::PrimitivesEmitted => self.queries[key].end = self.tf_prims_generated,
            QueryType::Timestamp | QueryType::TimeElapsed => {}
        }
    }

    /// Read a query result, flushing the work that produces it
    ///
    /// Occlusion results wait for the GPU without a timeout. Returns `None`
    /// for query types without a result.
    pub fn get_query_result(&mut self, key: QueryKey) -> Result<Option<QueryResult>> {
        let query_type = self.queries[key].query_type;

        match query_type {
            QueryType::OcclusionCounter | QueryType::OcclusionPredicate | QueryType::OcclusionPredicateConservative => {
                let Some(bo) = self.queries[key].bo.clone() else {
                    // Never begun
                    return Ok(Some(match query_type {
                        QueryType::OcclusionCounter => QueryResult::U64(0),
                        _ => QueryResult::Bool(false),
                    }));
                };

                self.flush_batches_accessing_bo(bo.gpu_address())?;
                bo.wait(None);

                let mut bytes = [0u8; 4];
                bo.read(0, &mut bytes)?;
                let passed = u32::from_le_bytes(bytes);

                Ok(Some(match query_type {
                    QueryType::OcclusionCounter => QueryResult::U64(passed as u64),
                    _ => QueryResult::Bool(passed != 0),
                }))
            }
            QueryType::PrimitivesGenerated | QueryType::PrimitivesEmitted => {
                self.flush(false)?;
                let query = &self.queries[key];
                Ok(Some(QueryResult::U64(query.end.wrapping_sub(query.start))))
            }
            QueryType::Timestamp | QueryType::TimeElapsed => Ok(None),
        }
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;

//! Ordered, addressable views over servers
//!
//! A [`ServerSlice`] borrows the servers it lists from their facets, so a
//! slice can never outlive the cluster it was taken from. [`SliceIndexes`]
//! describes which positions to select.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Range, RangeInclusive};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::server::{ResolvedServer, Server};

/// Most positions a parsed [`SliceIndexes`] may list.
pub const MAX_SLICE_INDEXES: usize = 10_000;

/// Which servers to pick out of a facet or slice.
///
/// # Example
///
/// ```
/// use chef_core::SliceIndexes;
///
/// let indexes: SliceIndexes = "0-2,5".parse().unwrap();
/// assert_eq!(indexes, SliceIndexes::List(vec![0, 1, 2, 5]));
/// assert_eq!("".parse::<SliceIndexes>().unwrap(), SliceIndexes::All);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SliceIndexes {
    /// Every server, in order.
    #[default]
    All,
    /// The listed positions, in the listed order.
    List(Vec<usize>),
}

impl SliceIndexes {
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl fmt::Display for SliceIndexes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::List(indexes) => {
                let parts: Vec<String> = indexes.iter().map(usize::to_string).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

impl From<usize> for SliceIndexes {
    fn from(index: usize) -> Self {
        Self::List(vec![index])
    }
}

impl From<Vec<usize>> for SliceIndexes {
    fn from(indexes: Vec<usize>) -> Self {
        Self::List(indexes)
    }
}

impl From<&[usize]> for SliceIndexes {
    fn from(indexes: &[usize]) -> Self {
        Self::List(indexes.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for SliceIndexes {
    fn from(indexes: [usize; N]) -> Self {
        Self::List(indexes.to_vec())
    }
}

impl From<Range<usize>> for SliceIndexes {
    fn from(range: Range<usize>) -> Self {
        Self::List(range.collect())
    }
}

impl From<RangeInclusive<usize>> for SliceIndexes {
    fn from(range: RangeInclusive<usize>) -> Self {
        Self::List(range.collect())
    }
}

impl From<Option<SliceIndexes>> for SliceIndexes {
    fn from(indexes: Option<SliceIndexes>) -> Self {
        indexes.unwrap_or_default()
    }
}

impl FromStr for SliceIndexes {
    type Err = Error;

    /// Parse comma-separated indexes and inclusive ranges, e.g. `0-2,5`.
    ///
    /// At most [`MAX_SLICE_INDEXES`] positions are accepted in total.
    fn from_str(s: &str) -> Result<Self> {
        let spec = s.trim();
        if spec.is_empty() || spec.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }

        let invalid = |reason: String| Error::InvalidSliceIndexes {
            spec: s.to_string(),
            reason,
        };
        let parse_one = |part: &str| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| invalid(format!("'{}' is not an index", part.trim())))
        };

        let too_many = || invalid(format!("selects more than {MAX_SLICE_INDEXES} servers"));

        let mut indexes = Vec::new();
        for part in spec.split(',') {
            let room = MAX_SLICE_INDEXES - indexes.len();
            match part.split_once('-') {
                Some((start, end)) => {
                    let (start, end) = (parse_one(start)?, parse_one(end)?);
                    if start > end {
                        return Err(invalid(format!("range {start}-{end} is reversed")));
                    }
                    if end - start >= room {
                        return Err(too_many());
                    }
                    indexes.extend(start..=end);
                }
                None => {
                    let index = parse_one(part)?;
                    if room == 0 {
                        return Err(too_many());
                    }
                    indexes.push(index);
                }
            }
        }
        Ok(Self::List(indexes))
    }
}

/// An ordered, non-owning view over servers of one cluster.
#[derive(Debug, Clone)]
pub struct ServerSlice<'a> {
    cluster_name: &'a str,
    servers: Vec<&'a Server>,
}

impl<'a> ServerSlice<'a> {
    pub fn new(cluster_name: &'a str, servers: Vec<&'a Server>) -> Self {
        Self {
            cluster_name,
            servers,
        }
    }

    /// Concatenate slices, keeping each slice's order.
    pub fn flatten<I>(cluster_name: &'a str, slices: I) -> Self
    where
        I: IntoIterator<Item = ServerSlice<'a>>,
    {
        let servers = slices.into_iter().flat_map(|slice| slice.servers).collect();
        Self::new(cluster_name, servers)
    }

    pub fn cluster_name(&self) -> &'a str {
        self.cluster_name
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a Server> {
        self.servers.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Server> + '_ {
        self.servers.iter().copied()
    }

    /// Select positions of this slice; out-of-range positions are an error.
    pub fn select(&self, indexes: &SliceIndexes) -> Result<ServerSlice<'a>> {
        self.select_in_scope(indexes, "all facets")
    }

    pub(crate) fn select_in_scope(&self, indexes: &SliceIndexes, scope: &str) -> Result<ServerSlice<'a>> {
        let servers = match indexes {
            SliceIndexes::All => self.servers.clone(),
            SliceIndexes::List(list) => list
                .iter()
                .map(|&index| {
                    self.get(index).ok_or_else(|| Error::IndexOutOfRange {
                        cluster: self.cluster_name.to_string(),
                        scope: scope.to_string(),
                        index,
                        len: self.servers.len(),
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        };
        tracing::debug!(
            cluster = self.cluster_name,
            scope,
            %indexes,
            selected = servers.len(),
            "Selected servers"
        );
        Ok(Self::new(self.cluster_name, servers))
    }

    pub fn fullnames(&self) -> Vec<String> {
        self.servers.iter().map(|s| s.fullname()).collect()
    }

    /// Names of the facets represented in this slice (sorted).
    pub fn facet_names(&self) -> BTreeSet<&'a str> {
        self.servers.iter().map(|s| s.facet_name()).collect()
    }

    /// Resolved records of the servers in this slice.
    ///
    /// Servers that have not been resolved yet are skipped.
    pub fn resolved(&self) -> Vec<&'a ResolvedServer> {
        self.servers.iter().filter_map(|s| s.resolved()).collect()
    }
}

impl<'a> IntoIterator for ServerSlice<'a> {
    type Item = &'a Server;
    type IntoIter = std::vec::IntoIter<&'a Server>;

    fn into_iter(self) -> Self::IntoIter {
        self.servers.into_iter()
    }
}

impl<'a, 'b> IntoIterator for &'b ServerSlice<'a> {
    type Item = &'a Server;
    type IntoIter = std::iter::Copied<std::slice::Iter<'b, &'a Server>>;

    fn into_iter(self) -> Self::IntoIter {
        self.servers.iter().copied()
    }
}

//! Ordering analysis of a single query.
//!
//! [`SortAnalysis`] owns the [`SortInfo`] of a query while the analyzer runs
//! its phases. Every phase that materializes or renames expressions hands
//! its substitution map to [`SortAnalysis::apply`]. When analysis is done,
//! the plan generator takes the result with [`SortAnalysis::into_sort_info`].

use crate::config::Options;
use crate::error::Error;
use crate::order_by::{resolve_order_by, OrderByElement, SelectItem};
use crate::sort_info::SortInfo;
use crate::substitution::SubstitutionMap;
use crate::tlog;

#[derive(Debug)]
pub struct SortAnalysis {
    sort_info: SortInfo,
    options: Options,
    phases: usize,
}

impl SortAnalysis {
    #[must_use]
    pub fn new(sort_info: SortInfo, options: Options) -> Self {
        SortAnalysis {
            sort_info,
            options,
            phases: 0,
        }
    }

    /// Resolves the ORDER BY clause and starts the analysis with it.
    ///
    /// # Errors
    /// - see [`resolve_order_by`]
    pub fn from_order_by(
        select_list: &[SelectItem],
        elements: Vec<OrderByElement>,
        options: Options,
    ) -> Result<Self, Error> {
        let sort_info = resolve_order_by(select_list, elements, &options)?;
        Ok(Self::new(sort_info, options))
    }

    /// Applies the substitution map produced by the analysis `phase`.
    /// Returns the number of ordering keys that changed.
    ///
    /// # Errors
    /// - the map has duplicate sources and `verify_substitution_maps` is on;
    ///   the sort info is left untouched in this case
    pub fn apply(&mut self, phase: &str, map: &SubstitutionMap) -> Result<usize, Error> {
        if self.options.verify_substitution_maps {
            map.verify()?;
        }
        let changed = self.sort_info.substitute(map);
        self.phases += 1;
        tlog!(Debug, "substituted ordering expressions";
            "phase" => phase,
            "entries" => map.len(),
            "changed" => changed,
            "order_by" => %self.sort_info,
        );
        Ok(changed)
    }

    #[must_use]
    pub fn sort_info(&self) -> &SortInfo {
        &self.sort_info
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Number of phases applied so far.
    #[must_use]
    pub fn phases(&self) -> usize {
        self.phases
    }

    #[must_use]
    pub fn into_sort_info(self) -> SortInfo {
        self.sort_info
    }
}

use crate::{
    entity::{Entity, EntityType},
    error::Error,
    query::page::Page,
};
use std::ops::Index;

///
/// ResultSet
///
/// Lazily extending view over a paged query. Pages are fetched on demand
/// and kept, so walking the set twice issues no second round of requests
/// and random access within loaded pages is free.
///

pub struct ResultSet<E: EntityType = Entity> {
    pages: Vec<Page<E>>,
}

impl<E: EntityType> ResultSet<E> {
    #[must_use]
    pub fn from_page(page: Page<E>) -> Self {
        Self { pages: vec![page] }
    }

    #[must_use]
    pub fn loaded_pages(&self) -> &[Page<E>] {
        &self.pages
    }

    #[must_use]
    pub fn loaded_page_count(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn first_loaded_page(&self) -> Option<&Page<E>> {
        self.pages.first()
    }

    #[must_use]
    pub fn last_loaded_page(&self) -> Option<&Page<E>> {
        self.pages.last()
    }

    /// Whether an unloaded page remains past the last loaded one.
    #[must_use]
    pub fn has_next_page(&self) -> bool {
        self.pages.last().is_some_and(Page::has_next_page)
    }

    /// Number of entities across loaded pages only.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.pages.iter().map(Page::len).sum()
    }

    /// Entity at `offset` within loaded pages only. Never fetches.
    #[must_use]
    pub fn get(&self, offset: usize) -> Option<&E> {
        let mut remaining = offset;
        for page in &self.pages {
            if remaining < page.len() {
                return page.get(remaining);
            }
            remaining -= page.len();
        }

        None
    }

    /// Flat view of every loaded entity.
    #[must_use]
    pub fn loaded(&self) -> Vec<&E> {
        self.pages.iter().flat_map(Page::iter).collect()
    }

    pub fn append_page(&mut self, page: Page<E>) {
        self.pages.push(page);
    }

    pub fn append(&mut self, other: Self) {
        self.pages.extend(other.pages);
    }

    /// Fetch and keep the page after the last loaded one. `Ok(false)` means
    /// the scan is exhausted.
    pub fn fetch_next_page(&mut self) -> Result<bool, Error> {
        let Some(last) = self.pages.last() else {
            return Ok(false);
        };
        match last.next_page()? {
            Some(page) => {
                self.pages.push(page);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Lending walk over pages, fetching as needed.
    pub fn pages(&mut self) -> PageCursor<'_, E> {
        PageCursor {
            result: self,
            index: 0,
        }
    }

    /// Total entity count, forcing the full scan.
    pub fn count(&mut self) -> Result<usize, Error> {
        while self.fetch_next_page()? {}

        Ok(self.loaded_count())
    }
}

impl<E: EntityType + Clone> ResultSet<E> {
    /// Walk every entity, fetching pages as needed. Yields clones so the
    /// set itself can keep extending mid-iteration.
    pub fn iter(&mut self) -> EntityIter<'_, E> {
        EntityIter {
            result: self,
            page: 0,
            offset: 0,
        }
    }

    /// Every entity in the set, forcing the full scan.
    pub fn all(&mut self) -> Result<Vec<E>, Error> {
        self.iter().collect()
    }
}

impl<E: EntityType> Index<usize> for ResultSet<E> {
    type Output = E;

    /// Panics when `offset` is past the loaded pages; use
    /// [`ResultSet::get`] for a fallible lookup.
    fn index(&self, offset: usize) -> &Self::Output {
        self.get(offset)
            .unwrap_or_else(|| panic!("offset {offset} is past the loaded pages"))
    }
}

///
/// PageCursor
///
/// Lends each page in turn, fetching past the loaded ones.
///

pub struct PageCursor<'a, E: EntityType = Entity> {
    result: &'a mut ResultSet<E>,
    index: usize,
}

impl<E: EntityType> PageCursor<'_, E> {
    pub fn try_next(&mut self) -> Result<Option<&Page<E>>, Error> {
        if self.index >= self.result.pages.len() && !self.result.fetch_next_page()? {
            return Ok(None);
        }

        let page = &self.result.pages[self.index];
        self.index += 1;

        Ok(Some(page))
    }
}

///
/// EntityIter
///

pub struct EntityIter<'a, E: EntityType = Entity> {
    result: &'a mut ResultSet<E>,
    page: usize,
    offset: usize,
}

impl<E: EntityType + Clone> Iterator for EntityIter<'_, E> {
    type Item = Result<E, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.page < self.result.pages.len() {
                let current = &self.result.pages[self.page];
                if let Some(entity) = current.get(self.offset) {
                    self.offset += 1;
                    return Some(Ok(entity.clone()));
                }
                self.page += 1;
                self.offset = 0;
                continue;
            }
            match self.result.fetch_next_page() {
                Ok(true) => {}
                Ok(false) => return None,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

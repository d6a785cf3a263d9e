mod copies;
mod id;
mod title;

pub use self::{copies::*, id::*, title::*};
use crate::{KernelError, Precondition};
use destructure::{Destructure, Mutation};
use error_stack::Report;
use serde::{Deserialize, Serialize};
use vodca::References;

/// A title and its copy counters. `0 <= available_copies <= total_copies` always holds;
/// the counters only move through [`Book::decrement`], [`Book::increment`] and [`Book::restore`].
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, References, Destructure, Mutation)]
pub struct Book {
    id: BookId,
    title: BookTitle,
    total_copies: TotalCopies,
    available_copies: AvailableCopies,
}

impl Book {
    pub fn new(
        id: BookId,
        title: BookTitle,
        total_copies: TotalCopies,
        available_copies: AvailableCopies,
    ) -> Self {
        let total = *total_copies.as_ref();
        let available = (*available_copies.as_ref()).clamp(0, total);
        Self {
            id,
            title,
            total_copies,
            available_copies: AvailableCopies::new(available),
        }
    }

    /// A freshly catalogued title with every copy on the shelf.
    pub fn catalogue(id: BookId, title: BookTitle, total_copies: TotalCopies) -> Self {
        let available = AvailableCopies::new(*total_copies.as_ref());
        Self::new(id, title, total_copies, available)
    }

    pub fn is_available(&self) -> bool {
        *self.available_copies.as_ref() > 0
    }

    pub fn decrement(&mut self) -> error_stack::Result<(), KernelError> {
        if !self.is_available() {
            return Err(Report::new(KernelError::from(Precondition::Unavailable))
                .attach_printable(format!("book {:?} has no available copy", self.id)));
        }
        let available = *self.available_copies.as_ref() - 1;
        self.substitute(|book| *book.available_copies = AvailableCopies::new(available));
        Ok(())
    }

    /// Clamped at `total_copies`; returns whether the counter moved.
    pub fn increment(&mut self) -> bool {
        let available = *self.available_copies.as_ref();
        if available >= *self.total_copies.as_ref() {
            return false;
        }
        self.substitute(|book| *book.available_copies = AvailableCopies::new(available + 1));
        true
    }

    /// Reconciliation only: overwrite the counter with a recomputed value, clamped to bounds.
    /// `Conflict` when the counter no longer holds `recorded`, the value the recount was based on.
    pub fn restore(
        &mut self,
        recorded: AvailableCopies,
        available: AvailableCopies,
    ) -> error_stack::Result<(), KernelError> {
        if self.available_copies != recorded {
            return Err(Report::new(KernelError::Conflict).attach_printable(format!(
                "book {:?} moved from {} to {} during reconciliation",
                self.id,
                recorded.as_ref(),
                self.available_copies.as_ref()
            )));
        }
        let available = (*available.as_ref()).clamp(0, *self.total_copies.as_ref());
        self.substitute(|book| *book.available_copies = AvailableCopies::new(available));
        Ok(())
    }
}

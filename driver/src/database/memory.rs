use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use error_stack::Report;
use kernel::interface::config::{DependOnClock, DependOnLendingPolicy, LendingPolicy};
use kernel::interface::database::{DatabaseConnection, DependOnDatabaseConnection};
use kernel::interface::job::DependOnPendingUpdateQueue;
use kernel::interface::query::{
    DependOnBookQuery, DependOnLoanQuery, DependOnReservationQuery, DependOnUserQuery,
};
use kernel::interface::update::{
    DependOnBookModifier, DependOnLoanModifier, DependOnReservationModifier, DependOnUserModifier,
};
use kernel::prelude::entity::{
    Book, BookId, Loan, LoanId, Reservation, ReservationId, User, UserId,
};
use kernel::KernelError;
use time::macros::datetime;
use tokio::sync::{Mutex, MutexGuard};

pub use self::{book::*, clock::*, loan::*, queue::*, reservation::*, user::*};

mod book;
mod clock;
mod loan;
mod queue;
mod reservation;
mod user;

/// Store calls that can be made to fail once, to exercise partial-failure paths.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum StoreOperation {
    FindBook,
    CreateBook,
    DecrementAvailable,
    IncrementAvailable,
    RestoreAvailable,
    FindUser,
    CreateUser,
    IncrementLoans,
    DecrementLoans,
    RestoreLoans,
    RestoreFines,
    AddFine,
    FindLoan,
    CreateLoan,
    UpdateLoan,
    FindReservation,
    CreateReservation,
    UpdateReservation,
}

#[derive(Default)]
pub(in crate::database) struct Store {
    pub(in crate::database) books: HashMap<BookId, Book>,
    pub(in crate::database) users: HashMap<UserId, User>,
    pub(in crate::database) loans: HashMap<LoanId, Loan>,
    pub(in crate::database) reservations: HashMap<ReservationId, Reservation>,
    faults: HashMap<StoreOperation, VecDeque<Option<KernelError>>>,
}

impl Store {
    pub(in crate::database) fn check(
        &mut self,
        operation: StoreOperation,
    ) -> error_stack::Result<(), KernelError> {
        match self.faults.get_mut(&operation).and_then(VecDeque::pop_front).flatten() {
            Some(error) => Err(Report::new(error)
                .attach_printable(format!("injected failure on {operation:?}"))),
            None => Ok(()),
        }
    }
}

/// A document store held in process memory. Every call takes the single lock, so each
/// call is atomic on its own and nothing spans two calls.
#[derive(Clone)]
pub struct InMemoryDatabase {
    store: Arc<Mutex<Store>>,
    clock: ManualClock,
    policy: LendingPolicy,
    queue: InMemoryPendingUpdateQueue,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::with_policy(LendingPolicy::default())
    }

    pub fn with_policy(policy: LendingPolicy) -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            clock: ManualClock::new(datetime!(2024-01-01 09:00 UTC)),
            policy,
            queue: InMemoryPendingUpdateQueue::default(),
        }
    }

    /// Makes the next call of `operation` fail with `error`. Calls queue up.
    pub async fn fail_next(&self, operation: StoreOperation, error: KernelError) {
        self.fail_after(operation, 0, error).await;
    }

    /// Lets `calls` calls of `operation` through, then fails the one after with `error`.
    pub async fn fail_after(&self, operation: StoreOperation, calls: usize, error: KernelError) {
        let mut store = self.store.lock().await;
        let faults = store.faults.entry(operation).or_default();
        faults.extend(std::iter::repeat(None).take(calls));
        faults.push_back(Some(error));
    }

    pub async fn seed_book(&self, book: Book) {
        self.store.lock().await.books.insert(book.id().clone(), book);
    }

    pub async fn seed_user(&self, user: User) {
        self.store.lock().await.users.insert(user.id().clone(), user);
    }

    pub async fn seed_loan(&self, loan: Loan) {
        self.store.lock().await.loans.insert(loan.id().clone(), loan);
    }

    pub async fn seed_reservation(&self, reservation: Reservation) {
        self.store
            .lock()
            .await
            .reservations
            .insert(reservation.id().clone(), reservation);
    }

    pub async fn book(&self, id: &BookId) -> Option<Book> {
        self.store.lock().await.books.get(id).cloned()
    }

    pub async fn user(&self, id: &UserId) -> Option<User> {
        self.store.lock().await.users.get(id).cloned()
    }

    pub async fn loan(&self, id: &LoanId) -> Option<Loan> {
        self.store.lock().await.loans.get(id).cloned()
    }

    pub async fn reservation(&self, id: &ReservationId) -> Option<Reservation> {
        self.store.lock().await.reservations.get(id).cloned()
    }
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

pub struct InMemoryConnection(Arc<Mutex<Store>>);

impl InMemoryConnection {
    pub(in crate::database) async fn lock(&self) -> MutexGuard<'_, Store> {
        self.0.lock().await
    }
}

#[async_trait::async_trait]
impl DatabaseConnection for InMemoryDatabase {
    type Connection = InMemoryConnection;
    async fn acquire(&self) -> error_stack::Result<Self::Connection, KernelError> {
        Ok(InMemoryConnection(Arc::clone(&self.store)))
    }
}

impl DependOnDatabaseConnection for InMemoryDatabase {
    type DatabaseConnection = Self;
    fn database_connection(&self) -> &Self::DatabaseConnection {
        self
    }
}

impl DependOnClock for InMemoryDatabase {
    type Clock = ManualClock;
    fn clock(&self) -> &Self::Clock {
        &self.clock
    }
}

impl DependOnLendingPolicy for InMemoryDatabase {
    fn lending_policy(&self) -> &LendingPolicy {
        &self.policy
    }
}

impl DependOnPendingUpdateQueue for InMemoryDatabase {
    type PendingUpdateQueue = InMemoryPendingUpdateQueue;
    fn pending_update_queue(&self) -> &Self::PendingUpdateQueue {
        &self.queue
    }
}

impl DependOnBookQuery for InMemoryDatabase {
    type BookQuery = InMemoryBookRepository;
    fn book_query(&self) -> &Self::BookQuery {
        &InMemoryBookRepository
    }
}

impl DependOnBookModifier for InMemoryDatabase {
    type BookModifier = InMemoryBookRepository;
    fn book_modifier(&self) -> &Self::BookModifier {
        &InMemoryBookRepository
    }
}

impl DependOnUserQuery for InMemoryDatabase {
    type UserQuery = InMemoryUserRepository;
    fn user_query(&self) -> &Self::UserQuery {
        &InMemoryUserRepository
    }
}

impl DependOnUserModifier for InMemoryDatabase {
    type UserModifier = InMemoryUserRepository;
    fn user_modifier(&self) -> &Self::UserModifier {
        &InMemoryUserRepository
    }
}

impl DependOnLoanQuery for InMemoryDatabase {
    type LoanQuery = InMemoryLoanRepository;
    fn loan_query(&self) -> &Self::LoanQuery {
        &InMemoryLoanRepository
    }
}

impl DependOnLoanModifier for InMemoryDatabase {
    type LoanModifier = InMemoryLoanRepository;
    fn loan_modifier(&self) -> &Self::LoanModifier {
        &InMemoryLoanRepository
    }
}

impl DependOnReservationQuery for InMemoryDatabase {
    type ReservationQuery = InMemoryReservationRepository;
    fn reservation_query(&self) -> &Self::ReservationQuery {
        &InMemoryReservationRepository
    }
}

impl DependOnReservationModifier for InMemoryDatabase {
    type ReservationModifier = InMemoryReservationRepository;
    fn reservation_modifier(&self) -> &Self::ReservationModifier {
        &InMemoryReservationRepository
    }
}

use driver::database::InMemoryDatabase;
use kernel::prelude::entity::{
    AccountActive, AvailableCopies, Book, BookId, BookTitle, CurrentLoans, FineAmount, LoanLimit,
    TotalCopies, User, UserId, UserName,
};
use uuid::Uuid;

pub(crate) async fn book(db: &InMemoryDatabase, total: i32, available: i32) -> Uuid {
    let id = Uuid::new_v4();
    db.seed_book(Book::new(
        BookId::new(id),
        BookTitle::new("Dune"),
        TotalCopies::new(total),
        AvailableCopies::new(available),
    ))
    .await;
    id
}

pub(crate) async fn user(db: &InMemoryDatabase, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    db.seed_user(User::register(UserId::new(id), UserName::new(name)))
        .await;
    id
}

pub(crate) async fn user_with(
    db: &InMemoryDatabase,
    limit: i32,
    current: i32,
    active: bool,
) -> Uuid {
    let id = Uuid::new_v4();
    db.seed_user(User::new(
        UserId::new(id),
        UserName::new("Paul"),
        LoanLimit::new(limit),
        CurrentLoans::new(current),
        AccountActive::new(active),
        FineAmount::zero(),
    ))
    .await;
    id
}

pub(crate) async fn available(db: &InMemoryDatabase, book_id: Uuid) -> i32 {
    db.book(&BookId::new(book_id))
        .await
        .map(|book| *book.available_copies().as_ref())
        .unwrap_or(-1)
}

pub(crate) async fn current_loans(db: &InMemoryDatabase, user_id: Uuid) -> i32 {
    db.user(&UserId::new(user_id))
        .await
        .map(|user| *user.current_loans().as_ref())
        .unwrap_or(-1)
}

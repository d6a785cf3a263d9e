use uuid::Uuid;

/// Stored counters against the values recomputed from loans and reservations.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ReconcileReportDto {
    pub id: Uuid,
    pub counters: Vec<CounterReportDto>,
}

impl ReconcileReportDto {
    pub fn corrected(&self) -> bool {
        self.counters.iter().any(|counter| counter.corrected)
    }

    pub fn counter(&self, name: &str) -> Option<&CounterReportDto> {
        self.counters.iter().find(|counter| counter.counter == name)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CounterReportDto {
    pub counter: &'static str,
    pub recorded: i64,
    pub expected: i64,
    pub corrected: bool,
}

pub struct ReconcileBookDto {
    pub book_id: Uuid,
}

pub struct ReconcileUserDto {
    pub user_id: Uuid,
}

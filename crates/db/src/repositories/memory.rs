use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use gavel_core::domain::approval::{NewRequestApproval, RequestApproval, RequestApprovalId};
use gavel_core::domain::auction::{Auction, AuctionId, Bid, BidId, NewBid};
use gavel_core::domain::jewelry::{Jewelry, JewelryId};
use gavel_core::domain::page::{Page, PageRequest, SortOrder};
use gavel_core::domain::user::{Role, User, UserId};

use super::{
    AuctionRepository, JewelryRepository, RepositoryError, RequestApprovalRepository, UnitOfWork,
    UnitOfWorkFactory, UserRepository,
};

#[derive(Clone, Debug, Default)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    jewelry: BTreeMap<JewelryId, Jewelry>,
    requests: BTreeMap<RequestApprovalId, RequestApproval>,
    auctions: BTreeMap<AuctionId, Auction>,
    bids: Vec<Bid>,
    last_request_id: i64,
    last_bid_id: i64,
}

impl MemoryState {
    fn insert_request(&mut self, request: NewRequestApproval) -> RequestApproval {
        self.last_request_id += 1;
        let created = RequestApproval::from_new(RequestApprovalId(self.last_request_id), request);
        self.requests.insert(created.id, created.clone());
        created
    }

    fn update_request(&mut self, request: &RequestApproval) -> Result<(), RepositoryError> {
        match self.requests.get_mut(&request.id) {
            Some(stored) => {
                *stored = request.clone();
                Ok(())
            }
            None => Err(RepositoryError::Decode(format!(
                "request approval {} vanished during update",
                request.id
            ))),
        }
    }

    fn highest_bid(&self, auction_id: AuctionId) -> Option<Decimal> {
        self.bids
            .iter()
            .filter(|bid| bid.auction_id == auction_id)
            .map(|bid| bid.price_given)
            .max()
    }

    fn insert_bid(&mut self, bid: NewBid) -> Bid {
        self.last_bid_id += 1;
        let created = Bid {
            id: BidId(self.last_bid_id),
            auction_id: bid.auction_id,
            user_id: bid.user_id,
            price_given: bid.price_given,
            time: bid.time,
        };
        self.bids.push(created.clone());
        created
    }

    fn page_requests(
        &self,
        page: PageRequest,
        keep: impl Fn(&RequestApproval) -> bool,
    ) -> Page<RequestApproval> {
        let mut matching: Vec<RequestApproval> =
            self.requests.values().filter(|request| keep(request)).cloned().collect();
        matching.sort_by(|a, b| (a.request_time, a.id).cmp(&(b.request_time, b.id)));
        if page.sort == SortOrder::NewestFirst {
            matching.reverse();
        }
        Page::from_sorted(matching, page)
    }

    fn page_bids(&self, page: PageRequest, keep: impl Fn(&Bid) -> bool) -> Page<Bid> {
        let mut matching: Vec<Bid> = self.bids.iter().filter(|bid| keep(bid)).cloned().collect();
        matching.sort_by(|a, b| (a.time, a.id).cmp(&(b.time, b.id)));
        if page.sort == SortOrder::NewestFirst {
            matching.reverse();
        }
        Page::from_sorted(matching, page)
    }
}

/// Process-local store implementing every repository and the unit of work.
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save_auction(&self, auction: Auction) {
        self.state.lock().await.auctions.insert(auction.id, auction);
    }
}

#[async_trait::async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        self.state.lock().await.users.insert(user.id, user);
        Ok(())
    }
}

#[async_trait::async_trait]
impl JewelryRepository for InMemoryStore {
    async fn find_by_id(&self, id: JewelryId) -> Result<Option<Jewelry>, RepositoryError> {
        Ok(self.state.lock().await.jewelry.get(&id).cloned())
    }

    async fn save(&self, jewelry: Jewelry) -> Result<(), RepositoryError> {
        self.state.lock().await.jewelry.insert(jewelry.id, jewelry);
        Ok(())
    }
}

#[async_trait::async_trait]
impl RequestApprovalRepository for InMemoryStore {
    async fn find_by_id(
        &self,
        id: RequestApprovalId,
    ) -> Result<Option<RequestApproval>, RepositoryError> {
        Ok(self.state.lock().await.requests.get(&id).cloned())
    }

    async fn insert(&self, request: NewRequestApproval) -> Result<RequestApproval, RepositoryError> {
        Ok(self.state.lock().await.insert_request(request))
    }

    async fn update(&self, request: &RequestApproval) -> Result<(), RepositoryError> {
        self.state.lock().await.update_request(request)
    }

    async fn list_by_sender_role(
        &self,
        role: Role,
        page: PageRequest,
    ) -> Result<Page<RequestApproval>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.page_requests(page, |request| {
            state.users.get(&request.sender_id).is_some_and(|sender| sender.role == role)
        }))
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<RequestApproval>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.page_requests(page, |request| request.sender_id == user_id))
    }

    async fn list_passed(
        &self,
        page: PageRequest,
    ) -> Result<Page<RequestApproval>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.page_requests(page, RequestApproval::is_passed))
    }
}

#[async_trait::async_trait]
impl AuctionRepository for InMemoryStore {
    async fn find_by_id(&self, id: AuctionId) -> Result<Option<Auction>, RepositoryError> {
        Ok(self.state.lock().await.auctions.get(&id).cloned())
    }

    async fn save(&self, auction: Auction) -> Result<(), RepositoryError> {
        self.save_auction(auction).await;
        Ok(())
    }

    async fn highest_bid(&self, auction_id: AuctionId) -> Result<Option<Decimal>, RepositoryError> {
        Ok(self.state.lock().await.highest_bid(auction_id))
    }

    async fn list_bids_by_auction(
        &self,
        auction_id: AuctionId,
        page: PageRequest,
    ) -> Result<Page<Bid>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.page_bids(page, |bid| bid.auction_id == auction_id))
    }

    async fn list_bids_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Bid>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.page_bids(page, |bid| bid.user_id == user_id))
    }
}

#[async_trait::async_trait]
impl UnitOfWorkFactory for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryUnitOfWork { guard, staged }))
    }
}

/// Holds the store lock for its whole lifetime and writes to a staged copy.
/// The copy replaces the shared state only on `commit`.
pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait::async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn find_request(
        &mut self,
        id: RequestApprovalId,
    ) -> Result<Option<RequestApproval>, RepositoryError> {
        Ok(self.staged.requests.get(&id).cloned())
    }

    async fn insert_request(
        &mut self,
        request: NewRequestApproval,
    ) -> Result<RequestApproval, RepositoryError> {
        Ok(self.staged.insert_request(request))
    }

    async fn update_request(&mut self, request: &RequestApproval) -> Result<(), RepositoryError> {
        self.staged.update_request(request)
    }

    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.staged.users.get(&id).cloned())
    }

    async fn find_jewelry(&mut self, id: JewelryId) -> Result<Option<Jewelry>, RepositoryError> {
        Ok(self.staged.jewelry.get(&id).cloned())
    }

    async fn save_jewelry(&mut self, jewelry: &Jewelry) -> Result<(), RepositoryError> {
        self.staged.jewelry.insert(jewelry.id, jewelry.clone());
        Ok(())
    }

    async fn find_auction(&mut self, id: AuctionId) -> Result<Option<Auction>, RepositoryError> {
        Ok(self.staged.auctions.get(&id).cloned())
    }

    async fn highest_bid(
        &mut self,
        auction_id: AuctionId,
    ) -> Result<Option<Decimal>, RepositoryError> {
        Ok(self.staged.highest_bid(auction_id))
    }

    async fn insert_bid(&mut self, bid: NewBid) -> Result<Bid, RepositoryError> {
        Ok(self.staged.insert_bid(bid))
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let InMemoryUnitOfWork { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

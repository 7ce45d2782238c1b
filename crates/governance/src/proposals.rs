//! Proposal records and the vote table
//!
//! Proposals live in an id-keyed table; votes live in a separate table keyed
//! by `(proposal id, voter)` so a proposal record never grows with its
//! electorate.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use rdao_core::{Identity, Timestamp};

use crate::execution::ProposalEffect;
use crate::voting::{VoteRecord, VoteTally};
use crate::{GovernanceError, GovernanceResult};

/// Proposal identifier. Zero is never assigned.
pub type ProposalId = u64;

/// Lifecycle status of a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// Open for voting
    Active,
    /// Withdrawn by its proposer or an admin before finalization
    Canceled,
    /// Missed quorum or approval
    Defeated,
    /// Passed, waiting for the execution delay to elapse
    Succeeded,
    /// Effect carried out
    Executed,
    /// Passed but not executed within the grace period
    Expired,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalStatus::Active | ProposalStatus::Succeeded)
    }

    pub fn can_transition_to(&self, next: ProposalStatus) -> bool {
        use ProposalStatus::*;
        matches!(
            (*self, next),
            (Active, Canceled)
                | (Active, Defeated)
                | (Active, Succeeded)
                | (Succeeded, Executed)
                | (Succeeded, Expired)
        )
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Informational category of a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProposalType {
    #[default]
    General,
    /// Funding for a research project
    ResearchFunding,
    /// Change to governance parameters
    ParameterChange,
    /// Membership or role changes
    Membership,
    /// Treasury management
    Treasury,
}

/// Caller-supplied fields of a new proposal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProposal {
    pub title: String,
    pub description: String,
    /// Pointer to the full proposal text, e.g. a content hash
    #[serde(default)]
    pub content_ref: String,
    #[serde(default)]
    pub proposal_type: ProposalType,
    #[serde(default)]
    pub effect: Option<ProposalEffect>,
}

impl NewProposal {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_content_ref(mut self, content_ref: impl Into<String>) -> Self {
        self.content_ref = content_ref.into();
        self
    }

    pub fn with_type(mut self, proposal_type: ProposalType) -> Self {
        self.proposal_type = proposal_type;
        self
    }

    pub fn with_effect(mut self, effect: ProposalEffect) -> Self {
        self.effect = Some(effect);
        self
    }
}

/// A governance proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub proposer: Identity,
    pub title: String,
    pub description: String,
    pub content_ref: String,
    pub proposal_type: ProposalType,
    pub status: ProposalStatus,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub tally: VoteTally,
    pub effect: Option<ProposalEffect>,
    /// Earliest execution time, set when the proposal succeeds
    pub execution_time: Option<Timestamp>,
}

impl Proposal {
    pub fn is_voting_open(&self, now: Timestamp) -> bool {
        self.status == ProposalStatus::Active && now < self.end_time
    }

    /// Move to `next`, rejecting anything the lifecycle does not allow
    pub fn transition(&mut self, next: ProposalStatus) -> GovernanceResult<ProposalStatus> {
        if !self.status.can_transition_to(next) {
            return Err(GovernanceError::invalid_state(format!(
                "proposal {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        let previous = self.status;
        self.status = next;
        Ok(previous)
    }

    /// Fail unless the proposal is in `expected`
    pub fn require_status(&self, expected: ProposalStatus) -> GovernanceResult<()> {
        if self.status != expected {
            return Err(GovernanceError::invalid_state(format!(
                "proposal {} is {}, expected {}",
                self.id, self.status, expected
            )));
        }
        Ok(())
    }
}

/// Proposal table plus vote table
#[derive(Debug, Clone, Default)]
pub struct ProposalBook {
    proposals: BTreeMap<ProposalId, Proposal>,
    /// Ordered by proposal first, so one proposal's votes form a contiguous range
    votes: BTreeMap<(ProposalId, Identity), VoteRecord>,
    last_id: ProposalId,
}

impl ProposalBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new `Active` proposal and return its id
    pub fn insert(
        &mut self,
        proposer: Identity,
        new: NewProposal,
        now: Timestamp,
        voting_period: u64,
    ) -> GovernanceResult<ProposalId> {
        let id = self
            .last_id
            .checked_add(1)
            .ok_or_else(|| GovernanceError::invalid_state("proposal ids exhausted"))?;
        let end_time = now
            .checked_add(voting_period)
            .ok_or_else(|| GovernanceError::invalid_input("voting period overflows the clock"))?;

        let proposal = Proposal {
            id,
            proposer,
            title: new.title,
            description: new.description,
            content_ref: new.content_ref,
            proposal_type: new.proposal_type,
            status: ProposalStatus::Active,
            start_time: now,
            end_time,
            tally: VoteTally::default(),
            effect: new.effect,
            execution_time: None,
        };
        self.proposals.insert(id, proposal);
        self.last_id = id;
        debug!(proposal_id = id, end_time, "Stored proposal");
        Ok(id)
    }

    pub fn get(&self, id: ProposalId) -> GovernanceResult<&Proposal> {
        self.proposals
            .get(&id)
            .ok_or_else(|| GovernanceError::NotFound(format!("proposal {}", id)))
    }

    pub fn get_mut(&mut self, id: ProposalId) -> GovernanceResult<&mut Proposal> {
        self.proposals
            .get_mut(&id)
            .ok_or_else(|| GovernanceError::NotFound(format!("proposal {}", id)))
    }

    /// Check everything about a vote that does not need the voter's weight
    pub fn ensure_votable(&self, id: ProposalId, voter: &Identity, now: Timestamp) -> GovernanceResult<()> {
        let proposal = self.get(id)?;
        proposal.require_status(ProposalStatus::Active)?;
        if !proposal.is_voting_open(now) {
            return Err(GovernanceError::timing(format!(
                "voting on proposal {} closed at {}",
                id, proposal.end_time
            )));
        }
        if self.has_voted(id, voter) {
            return Err(GovernanceError::AlreadyProcessed(format!(
                "{} already voted on proposal {}",
                voter, id
            )));
        }
        Ok(())
    }

    /// Add a vote to its proposal's tally and store it
    pub fn record_vote(&mut self, record: VoteRecord) -> GovernanceResult<()> {
        let now = record.cast_at;
        self.ensure_votable(record.proposal_id, &record.voter, now)?;

        let proposal = self.get_mut(record.proposal_id)?;
        let mut tally = proposal.tally;
        tally.add(record.kind, record.weight)?;
        proposal.tally = tally;

        self.votes
            .insert((record.proposal_id, record.voter.clone()), record);
        Ok(())
    }

    pub fn has_voted(&self, id: ProposalId, voter: &Identity) -> bool {
        self.votes.contains_key(&(id, voter.clone()))
    }

    pub fn vote_of(&self, id: ProposalId, voter: &Identity) -> Option<&VoteRecord> {
        self.votes.get(&(id, voter.clone()))
    }

    /// Votes on `id`, oldest first
    pub fn votes(&self, id: ProposalId) -> Vec<VoteRecord> {
        let mut votes: Vec<VoteRecord> = self
            .votes
            .range((id, Identity::new(String::new()))..)
            .take_while(|((proposal_id, _), _)| *proposal_id == id)
            .map(|(_, record)| record.clone())
            .collect();
        votes.sort_by(|a, b| a.cast_at.cmp(&b.cast_at).then_with(|| a.voter.cmp(&b.voter)));
        votes
    }

    /// All proposals in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voting::VoteKind;
    use crate::ErrorKind;
    use rdao_core::DAY;

    fn vote(id: ProposalId, voter: &str, kind: VoteKind, weight: u128, at: Timestamp) -> VoteRecord {
        VoteRecord {
            proposal_id: id,
            voter: Identity::new(voter),
            kind,
            weight,
            cast_at: at,
        }
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut book = ProposalBook::new();
        let a = book.insert(Identity::new("p"), NewProposal::new("a", ""), 0, DAY).unwrap();
        let b = book.insert(Identity::new("p"), NewProposal::new("b", ""), 0, DAY).unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(book.len(), 2);
        assert_eq!(book.get(0).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_new_proposal_is_active_with_captured_end() {
        let mut book = ProposalBook::new();
        let id = book
            .insert(
                Identity::new("p"),
                NewProposal::new("Fund lab", "details")
                    .with_content_ref("ipfs://abc")
                    .with_type(ProposalType::ResearchFunding),
                1_000,
                7 * DAY,
            )
            .unwrap();
        let proposal = book.get(id).unwrap();
        assert_eq!(proposal.status, ProposalStatus::Active);
        assert_eq!(proposal.start_time, 1_000);
        assert_eq!(proposal.end_time, 1_000 + 7 * DAY);
        assert_eq!(proposal.tally, VoteTally::default());
        assert_eq!(proposal.content_ref, "ipfs://abc");
        assert_eq!(proposal.execution_time, None);
        assert!(proposal.is_voting_open(1_000 + 7 * DAY - 1));
        assert!(!proposal.is_voting_open(1_000 + 7 * DAY));
    }

    #[test]
    fn test_votes_are_scoped_to_their_proposal() {
        let mut book = ProposalBook::new();
        let first = book.insert(Identity::new("p"), NewProposal::new("a", ""), 0, DAY).unwrap();
        let second = book.insert(Identity::new("p"), NewProposal::new("b", ""), 0, DAY).unwrap();
        let third = book.insert(Identity::new("p"), NewProposal::new("c", ""), 0, DAY).unwrap();

        book.record_vote(vote(second, "zed", VoteKind::For, 5, 20)).unwrap();
        book.record_vote(vote(first, "alice", VoteKind::For, 1, 30)).unwrap();
        book.record_vote(vote(second, "amy", VoteKind::Against, 7, 10)).unwrap();
        book.record_vote(vote(third, "bob", VoteKind::Abstain, 3, 5)).unwrap();
        book.record_vote(vote(second, "bea", VoteKind::Abstain, 2, 20)).unwrap();

        let votes = book.votes(second);
        let voters: Vec<&str> = votes.iter().map(|v| v.voter.as_str()).collect();
        assert_eq!(voters, vec!["amy", "bea", "zed"]);
        assert_eq!(book.votes(first).len(), 1);
        assert_eq!(book.votes(third)[0].voter.as_str(), "bob");
        assert!(book.votes(99).is_empty());
    }

    #[test]
    fn test_votes_accumulate_and_are_unique() {
        let mut book = ProposalBook::new();
        let id = book.insert(Identity::new("p"), NewProposal::new("t", ""), 0, DAY).unwrap();

        book.record_vote(vote(id, "alice", VoteKind::For, 500, 10)).unwrap();
        book.record_vote(vote(id, "bob", VoteKind::Against, 200, 11)).unwrap();
        book.record_vote(vote(id, "carol", VoteKind::Abstain, 50, 12)).unwrap();

        let err = book
            .record_vote(vote(id, "alice", VoteKind::Against, 1, 13))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyProcessed);

        let tally = book.get(id).unwrap().tally;
        assert_eq!(tally.for_votes, 500);
        assert_eq!(tally.against_votes, 200);
        assert_eq!(tally.abstain_votes, 50);

        let votes = book.votes(id);
        assert_eq!(votes.len(), 3);
        assert_eq!(votes.iter().map(|v| v.weight).sum::<u128>(), tally.total());
        assert_eq!(book.vote_of(id, &Identity::new("alice")).unwrap().kind, VoteKind::For);
    }

    #[test]
    fn test_vote_after_end_is_a_timing_violation() {
        let mut book = ProposalBook::new();
        let id = book.insert(Identity::new("p"), NewProposal::new("t", ""), 0, DAY).unwrap();
        let err = book.record_vote(vote(id, "alice", VoteKind::For, 1, DAY)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimingViolation);
        assert!(book.votes(id).is_empty());
    }

    #[test]
    fn test_lifecycle_transitions() {
        use ProposalStatus::*;
        assert!(Active.can_transition_to(Succeeded));
        assert!(Succeeded.can_transition_to(Executed));
        assert!(Succeeded.can_transition_to(Expired));
        assert!(!Defeated.can_transition_to(Succeeded));
        assert!(!Executed.can_transition_to(Executed));
        assert!(!Active.can_transition_to(Executed));
        assert!(Canceled.is_terminal() && Expired.is_terminal());
        assert!(!Succeeded.is_terminal());
    }

    #[test]
    fn test_transition_rejects_illegal_moves() {
        let mut book = ProposalBook::new();
        let id = book.insert(Identity::new("p"), NewProposal::new("t", ""), 0, DAY).unwrap();
        let proposal = book.get_mut(id).unwrap();

        assert_eq!(proposal.transition(ProposalStatus::Defeated).unwrap(), ProposalStatus::Active);
        let err = proposal.transition(ProposalStatus::Succeeded).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(proposal.status, ProposalStatus::Defeated);
    }
}

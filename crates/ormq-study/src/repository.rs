//! Member queries used by the CLI and the walkthrough tests.

use ormq::prelude::*;
use ormq::proto::RelationalStore;
use ormq::QueryResults;
use tracing::debug;

use crate::domain::{Member, QMember, QTeam};
use crate::dto::{MemberSearchCondition, MemberTeamDto, QMemberTeamDto, TeamAge};
use crate::error::Result;

/// Repository over any [`RelationalStore`].
pub struct MemberRepository<'s, S> {
    factory: QueryFactory<'s, S>,
}

impl<'s, S: RelationalStore> MemberRepository<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            factory: QueryFactory::new(store),
        }
    }

    /// The query factory backing this repository.
    pub fn factory(&self) -> QueryFactory<'s, S> {
        self.factory
    }

    /// All members in key order.
    pub fn find_all(&self) -> Result<Vec<Member>> {
        let member = QMember::member();
        Ok(self
            .factory
            .select_from(&member)
            .order_by(member.id.asc())
            .fetch_list()?)
    }

    pub fn find_by_username(&self, username: &str) -> Result<Vec<Member>> {
        let member = QMember::member();
        Ok(self
            .factory
            .select_from(&member)
            .where_(member.username.eq(username))
            .fetch_list()?)
    }

    /// One member with its team loaded in the same round trip.
    pub fn find_with_team(&self, username: &str) -> Result<Option<Member>> {
        let member = QMember::member();
        let team = QTeam::team();
        Ok(self
            .factory
            .select_from(&member)
            .left_join(&member.team, &team)
            .fetch_join()
            .where_(member.username.eq(username))
            .fetch_one()?)
    }

    pub fn count(&self) -> Result<u64> {
        let member = QMember::member();
        Ok(self.factory.select_from(&member).fetch_count()?)
    }

    /// Members matching every present condition, joined with their team.
    pub fn search(&self, condition: &MemberSearchCondition) -> Result<Vec<MemberTeamDto>> {
        let member = QMember::member();
        let team = QTeam::team();
        Ok(self
            .factory
            .select(Projections::projected(QMemberTeamDto::new(&member, &team)))
            .from(&member)
            .left_join(&member.team, &team)
            .where_(search_filter(condition, &member, &team))
            .order_by(member.id.asc())
            .fetch_list()?)
    }

    /// One page of [`search`](Self::search) results plus the total count.
    pub fn search_page(
        &self,
        condition: &MemberSearchCondition,
        offset: i64,
        limit: i64,
    ) -> Result<QueryResults<MemberTeamDto>> {
        let member = QMember::member();
        let team = QTeam::team();
        let page = self
            .factory
            .select(Projections::projected(QMemberTeamDto::new(&member, &team)))
            .from(&member)
            .left_join(&member.team, &team)
            .where_(search_filter(condition, &member, &team))
            .order_by(member.id.asc())
            .offset(offset)
            .limit(limit)
            .fetch_page()?;
        debug!(total = page.total(), returned = page.results().len(), "member page");
        Ok(page)
    }

    /// Average member age per team, in first-seen team order.
    pub fn team_ages(&self) -> Result<Vec<TeamAge>> {
        let member = QMember::member();
        let team = QTeam::team();
        let rows = self
            .factory
            .select_tuple((&team.name, member.age.avg()))
            .from(&member)
            .join(&member.team, &team)
            .group_by(&team.name)
            .fetch_list()?;

        rows.into_iter()
            .map(|row| -> Result<TeamAge> {
                Ok(TeamAge {
                    team_name: row.get(&team.name)?.unwrap_or_default(),
                    average_age: row.get_at::<f64>(1)?.unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Add `delta` to the age of every member, or only of members younger
    /// than `below`. Returns the affected count.
    pub fn bump_ages(&self, delta: i32, below: Option<i32>) -> Result<u64> {
        let member = QMember::member();
        Ok(self
            .factory
            .update(&member)
            .set(&member.age, member.age.add(delta))
            .where_(Predicate::when(below, |age| member.age.lt(age)))
            .execute()?)
    }
}

fn search_filter(
    condition: &MemberSearchCondition,
    member: &QMember,
    team: &QTeam,
) -> Option<Predicate> {
    all_of([
        Predicate::when_not_empty(condition.username.as_deref(), |name| {
            member.username.eq(name)
        }),
        Predicate::when_not_empty(condition.team_name.as_deref(), |name| team.name.eq(name)),
        Predicate::when(condition.age_goe, |age| member.age.goe(age)),
        Predicate::when(condition.age_loe, |age| member.age.loe(age)),
    ])
}

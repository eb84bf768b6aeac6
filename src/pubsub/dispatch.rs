use std::{collections::BTreeMap, sync::Arc};

use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{MatchSnapshot, Message, PushOutcome, SubscriptionCore};

/// Как выбирать получателя внутри queue group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionPolicy {
    /// По кругу по участникам, упорядоченным по id. Курсор сбрасывается в
    /// ноль при любом изменении состава группы.
    #[default]
    RoundRobin,
    /// Случайный участник.
    Random,
}

/// Итог одной публикации.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Сколько подписок совпало с subject (до выбора в группах).
    pub matched: usize,
    /// В сколько mailbox сообщение попало.
    pub delivered: usize,
    /// Сколько сообщений потеряно из-за переполнения mailbox.
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy)]
struct GroupCursor {
    generation: u64,
    next: usize,
}

/// Выбор участника queue group.
#[derive(Debug)]
pub struct QueueSelector {
    policy: DistributionPolicy,
    cursors: DashMap<Arc<str>, GroupCursor>,
}

/// Доставка сообщения по снимку совпавших подписок.
#[derive(Debug)]
pub struct Dispatcher {
    selector: QueueSelector,
}

impl PublishOutcome {
    /// Ни одной подписки на subject не было.
    pub fn no_interest(&self) -> bool {
        self.matched == 0
    }
}

impl QueueSelector {
    pub fn new(policy: DistributionPolicy) -> Self {
        Self {
            policy,
            cursors: DashMap::new(),
        }
    }

    pub fn policy(&self) -> DistributionPolicy {
        self.policy
    }

    /// Индекс участника в `0..len`.
    pub fn select(
        &self,
        group: &Arc<str>,
        generation: u64,
        len: usize,
    ) -> usize {
        if len <= 1 {
            return 0;
        }
        match self.policy {
            DistributionPolicy::Random => rand::thread_rng().gen_range(0..len),
            DistributionPolicy::RoundRobin => {
                let mut cursor = self.cursors.entry(group.clone()).or_insert(GroupCursor {
                    generation,
                    next: 0,
                });
                if cursor.generation != generation {
                    *cursor = GroupCursor {
                        generation,
                        next: 0,
                    };
                }
                let index = cursor.next % len;
                cursor.next = index + 1;
                index
            }
        }
    }

    /// Забывает курсор группы, в которой не осталось участников.
    pub fn forget(
        &self,
        group: &str,
    ) {
        self.cursors.remove(group);
    }

    /// Число групп, для которых хранится курсор.
    pub fn tracked_groups(&self) -> usize {
        self.cursors.len()
    }
}

impl Dispatcher {
    pub fn new(policy: DistributionPolicy) -> Self {
        Self {
            selector: QueueSelector::new(policy),
        }
    }

    pub fn selector(&self) -> &QueueSelector {
        &self.selector
    }

    /// Раздаёт сообщение совпавшим подпискам.
    ///
    /// Подписки без группы получают сообщение каждая; в каждой группе -
    /// ровно один участник. Если выбранный участник успел отписаться,
    /// сообщение уходит следующему по кругу.
    pub fn dispatch(
        &self,
        snapshot: &MatchSnapshot,
        message: &Arc<Message>,
    ) -> PublishOutcome {
        let mut outcome = PublishOutcome {
            matched: snapshot.len(),
            ..Default::default()
        };

        let mut groups: BTreeMap<&Arc<str>, Vec<&Arc<SubscriptionCore>>> = BTreeMap::new();
        for sub in snapshot.iter() {
            match sub.queue_group() {
                Some(group) => groups.entry(group).or_default().push(sub),
                None => {
                    deliver(sub, message, &mut outcome);
                }
            }
        }

        for (group, mut members) in groups {
            members.sort_by_key(|s| s.id());
            let generation = snapshot.group_generation(group);
            let start = self.selector.select(group, generation, members.len());

            let delivered = (0..members.len())
                .map(|offset| members[(start + offset) % members.len()])
                .any(|sub| deliver(sub, message, &mut outcome));

            if !delivered {
                self.selector.forget(group);
            }
        }

        outcome
    }
}

/// Кладёт сообщение в mailbox. `false` - подписка уже неактивна.
fn deliver(
    sub: &SubscriptionCore,
    message: &Arc<Message>,
    outcome: &mut PublishOutcome,
) -> bool {
    if !sub.is_active() {
        return false;
    }
    match sub.mailbox().push(message.clone()) {
        PushOutcome::Enqueued => outcome.delivered += 1,
        PushOutcome::EvictedOldest => {
            outcome.delivered += 1;
            outcome.dropped += 1;
        }
        PushOutcome::Rejected => {
            outcome.dropped += 1;
            warn!(
                subscription = %sub.id(),
                subject = %message.subject,
                "mailbox full, message rejected"
            );
        }
        PushOutcome::Closed => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::pubsub::{MailboxConfig, Pattern, Registry, Subject};

    fn setup(
        policy: DistributionPolicy,
        members: usize,
    ) -> (Registry, Dispatcher, Vec<Arc<SubscriptionCore>>) {
        let registry = Registry::new();
        let group: Arc<str> = Arc::from("myQueue");
        let subs = (0..members)
            .map(|_| {
                registry.insert(
                    Pattern::parse("foo.bar.requests").unwrap(),
                    Some(group.clone()),
                    MailboxConfig::default(),
                )
            })
            .collect();
        (registry, Dispatcher::new(policy), subs)
    }

    fn publish(
        registry: &Registry,
        dispatcher: &Dispatcher,
    ) -> PublishOutcome {
        let subject = Subject::parse("foo.bar.requests").unwrap();
        let message = Arc::new(Message::new(subject.clone(), "foobar"));
        dispatcher.dispatch(&registry.find_matching(&subject), &message)
    }

    /// Тест проверяет, что в группе сообщение получает ровно один участник.
    #[test]
    fn test_exactly_one_member_receives() {
        for policy in [DistributionPolicy::RoundRobin, DistributionPolicy::Random] {
            let (registry, dispatcher, subs) = setup(policy, 3);
            for _ in 0..30 {
                let outcome = publish(&registry, &dispatcher);
                assert_eq!(outcome.matched, 3);
                assert_eq!(outcome.delivered, 1);
            }
            let total: usize = subs.iter().map(|s| s.mailbox().len()).sum();
            assert_eq!(total, 30);
        }
    }

    /// Тест проверяет равномерность round-robin.
    #[test]
    fn test_round_robin_is_fair() {
        let (registry, dispatcher, subs) = setup(DistributionPolicy::RoundRobin, 3);
        for _ in 0..9 {
            publish(&registry, &dispatcher);
        }
        for sub in &subs {
            assert_eq!(sub.mailbox().len(), 3);
        }
    }

    /// Тест проверяет сброс курсора при изменении состава группы.
    #[test]
    fn test_round_robin_resets_on_membership_change() {
        let (registry, dispatcher, subs) = setup(DistributionPolicy::RoundRobin, 3);
        publish(&registry, &dispatcher);
        publish(&registry, &dispatcher);
        assert_eq!(subs[0].mailbox().len(), 1);
        assert_eq!(subs[1].mailbox().len(), 1);

        registry.remove(subs[2].id());
        publish(&registry, &dispatcher);
        // После сброса снова начинаем с первого участника.
        assert_eq!(subs[0].mailbox().len(), 2);
        assert_eq!(subs[1].mailbox().len(), 1);
    }

    /// Тест проверяет, что подписки без группы и группы обслуживаются вместе.
    #[test]
    fn test_plain_and_grouped_together() {
        let (registry, dispatcher, _subs) = setup(DistributionPolicy::RoundRobin, 2);
        let plain = registry.insert(
            Pattern::parse("foo.>").unwrap(),
            None,
            MailboxConfig::default(),
        );
        let other_group = registry.insert(
            Pattern::parse("foo.*.requests").unwrap(),
            Some(Arc::from("audit")),
            MailboxConfig::default(),
        );

        let outcome = publish(&registry, &dispatcher);
        assert_eq!(outcome.matched, 4);
        assert_eq!(outcome.delivered, 3);
        assert_eq!(plain.mailbox().len(), 1);
        assert_eq!(other_group.mailbox().len(), 1);
    }

    /// Тест проверяет учёт отклонённых сообщений при переполнении.
    #[test]
    fn test_dropped_counted() {
        let registry = Registry::new();
        let dispatcher = Dispatcher::new(DistributionPolicy::RoundRobin);
        let sub = registry.insert(
            Pattern::parse("foo.bar.requests").unwrap(),
            None,
            MailboxConfig {
                capacity: Some(1),
                overflow: crate::pubsub::OverflowPolicy::DropNewest,
            },
        );
        assert_eq!(publish(&registry, &dispatcher).dropped, 0);
        let outcome = publish(&registry, &dispatcher);
        assert_eq!(outcome.delivered, 0);
        assert_eq!(outcome.dropped, 1);
        assert_eq!(sub.mailbox().len(), 1);
    }

    /// Тест проверяет, что `forget` удаляет курсор группы.
    #[test]
    fn test_forget_drops_cursor() {
        let (registry, dispatcher, subs) = setup(DistributionPolicy::RoundRobin, 2);
        publish(&registry, &dispatcher);
        assert_eq!(dispatcher.selector().tracked_groups(), 1);

        for sub in &subs {
            registry.remove(sub.id());
        }
        dispatcher.selector().forget("myQueue");
        assert_eq!(dispatcher.selector().tracked_groups(), 0);
    }

    /// Тест проверяет распределение случайной политики по всем участникам.
    #[test]
    fn test_random_policy_spreads() {
        let selector = QueueSelector::new(DistributionPolicy::Random);
        let group: Arc<str> = Arc::from("g");
        let mut seen: HashMap<usize, usize> = HashMap::new();
        for _ in 0..500 {
            let i = selector.select(&group, 1, 4);
            assert!(i < 4);
            *seen.entry(i).or_default() += 1;
        }
        assert_eq!(seen.len(), 4);
    }
}

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use ahash::AHashMap;
use parking_lot::RwLock;

use super::{Mailbox, MailboxConfig, Pattern, PatternToken, Subject};

/// Уникальный идентификатор подписки внутри брокера.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Подписка, которой владеет реестр.
///
/// Пользователь получает её через [`Subscription`](super::Subscription);
/// брокер кладёт сообщения в `mailbox`.
#[derive(Debug)]
pub struct SubscriptionCore {
    id: SubscriptionId,
    pattern: Pattern,
    queue_group: Option<Arc<str>>,
    mailbox: Mailbox,
    active: AtomicBool,
}

/// Снимок подписок, совпавших с subject.
///
/// Берётся под read-lock и перебирается уже без блокировки, поэтому
/// параллельные subscribe/unsubscribe не ломают итерацию.
#[derive(Debug, Default)]
pub struct MatchSnapshot {
    subscriptions: Vec<Arc<SubscriptionCore>>,
    group_generations: Vec<(Arc<str>, u64)>,
}

/// Узел префиксного дерева по токенам шаблона.
#[derive(Debug, Default)]
struct Node {
    literal: AHashMap<Box<str>, Node>,
    single: Option<Box<Node>>,
    /// Шаблоны, заканчивающиеся на `>` после пути к этому узлу.
    full: Vec<Arc<SubscriptionCore>>,
    /// Шаблоны, заканчивающиеся ровно в этом узле.
    exact: Vec<Arc<SubscriptionCore>>,
}

#[derive(Debug, Clone, Copy)]
struct GroupMembership {
    members: usize,
    generation: u64,
}

#[derive(Debug, Default)]
struct RegistryState {
    root: Node,
    by_id: AHashMap<SubscriptionId, Arc<SubscriptionCore>>,
    groups: AHashMap<Arc<str>, GroupMembership>,
    generation: u64,
}

/// Итог удаления подписки из реестра.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removed {
    /// Queue group, в которой после удаления не осталось участников.
    pub emptied_group: Option<Arc<str>>,
}

/// Реестр активных подписок.
///
/// Единственная разделяемая изменяемая структура брокера: все изменения идут
/// через `insert`/`remove` под write-lock, поиск - под read-lock.
#[derive(Debug, Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
    id_counter: AtomicU64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SubscriptionCore {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn queue_group(&self) -> Option<&Arc<str>> {
        self.queue_group.as_ref()
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl MatchSnapshot {
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SubscriptionCore>> {
        self.subscriptions.iter()
    }

    /// Поколение состава группы на момент снимка.
    pub fn group_generation(
        &self,
        group: &str,
    ) -> u64 {
        self.group_generations
            .iter()
            .find(|(name, _)| &**name == group)
            .map(|(_, generation)| *generation)
            .unwrap_or_default()
    }
}

impl IntoIterator for MatchSnapshot {
    type Item = Arc<SubscriptionCore>;
    type IntoIter = std::vec::IntoIter<Arc<SubscriptionCore>>;

    fn into_iter(self) -> Self::IntoIter {
        self.subscriptions.into_iter()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует подписку. После возврата она видна всем публикациям,
    /// начатым позже.
    ///
    /// `mailbox` должен пройти `BrokerConfig::validate`.
    pub(crate) fn insert(
        &self,
        pattern: Pattern,
        queue_group: Option<Arc<str>>,
        mailbox: MailboxConfig,
    ) -> Arc<SubscriptionCore> {
        let id = SubscriptionId(self.id_counter.fetch_add(1, Ordering::Relaxed) + 1);
        let core = Arc::new(SubscriptionCore {
            id,
            pattern,
            queue_group,
            mailbox: Mailbox::new(mailbox),
            active: AtomicBool::new(true),
        });

        let mut state = self.state.write();
        state.root.insert(core.pattern.tokens(), core.clone());
        state.by_id.insert(id, core.clone());
        if let Some(group) = core.queue_group.clone() {
            state.bump_group(group, true);
        }

        core
    }

    /// Атомарно удаляет подписку из индекса и закрывает её mailbox.
    ///
    /// Возвращает `None`, если подписка уже удалена.
    pub fn remove(
        &self,
        id: SubscriptionId,
    ) -> Option<Removed> {
        let (core, removed) = {
            let mut state = self.state.write();
            let core = state.by_id.remove(&id)?;
            core.active.store(false, Ordering::Release);
            state.root.remove(core.pattern.tokens(), id);

            let mut removed = Removed::default();
            if let Some(group) = core.queue_group.clone() {
                if state.bump_group(group.clone(), false) {
                    removed.emptied_group = Some(group);
                }
            }
            (core, removed)
        };
        core.mailbox.close();
        Some(removed)
    }

    pub fn get(
        &self,
        id: SubscriptionId,
    ) -> Option<Arc<SubscriptionCore>> {
        self.state.read().by_id.get(&id).cloned()
    }

    /// Снимок подписок, чей шаблон совпадает с `subject`.
    pub fn find_matching(
        &self,
        subject: &Subject,
    ) -> MatchSnapshot {
        let tokens: Vec<&str> = subject.tokens().collect();
        let state = self.state.read();

        let mut subscriptions = Vec::new();
        state.root.collect(&tokens, &mut subscriptions);

        let mut group_generations: Vec<(Arc<str>, u64)> = Vec::new();
        for group in subscriptions.iter().filter_map(|s| s.queue_group.as_ref()) {
            if group_generations.iter().any(|(name, _)| name == group) {
                continue;
            }
            let generation = state
                .groups
                .get(group)
                .map(|g| g.generation)
                .unwrap_or_default();
            group_generations.push((group.clone(), generation));
        }

        MatchSnapshot {
            subscriptions,
            group_generations,
        }
    }

    /// Есть ли хотя бы одна подписка на `subject`.
    pub fn has_interest(
        &self,
        subject: &Subject,
    ) -> bool {
        !self.find_matching(subject).is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Количество участников queue group.
    pub fn group_size(
        &self,
        group: &str,
    ) -> usize {
        self.state
            .read()
            .groups
            .get(group)
            .map(|g| g.members)
            .unwrap_or_default()
    }
}

impl Drop for Registry {
    /// Закрывает mailbox всех оставшихся подписок, чтобы разбудить
    /// ожидающих читателей.
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for core in state.by_id.values() {
            core.active.store(false, Ordering::Release);
            core.mailbox.close();
        }
    }
}

impl RegistryState {
    /// Обновляет состав группы. `true` - в группе не осталось участников.
    fn bump_group(
        &mut self,
        group: Arc<str>,
        joined: bool,
    ) -> bool {
        self.generation += 1;
        let generation = self.generation;
        let entry = self.groups.entry(group.clone()).or_insert(GroupMembership {
            members: 0,
            generation,
        });
        entry.generation = generation;
        if joined {
            entry.members += 1;
        } else {
            entry.members = entry.members.saturating_sub(1);
            if entry.members == 0 {
                self.groups.remove(&group);
                return true;
            }
        }
        false
    }
}

impl Node {
    fn insert(
        &mut self,
        tokens: &[PatternToken],
        core: Arc<SubscriptionCore>,
    ) {
        match tokens.split_first() {
            None => self.exact.push(core),
            Some((PatternToken::Full, _)) => self.full.push(core),
            Some((PatternToken::Single, rest)) => self
                .single
                .get_or_insert_with(Default::default)
                .insert(rest, core),
            Some((PatternToken::Literal(literal), rest)) => self
                .literal
                .entry(literal.clone())
                .or_default()
                .insert(rest, core),
        }
    }

    fn remove(
        &mut self,
        tokens: &[PatternToken],
        id: SubscriptionId,
    ) {
        match tokens.split_first() {
            None => self.exact.retain(|s| s.id != id),
            Some((PatternToken::Full, _)) => self.full.retain(|s| s.id != id),
            Some((PatternToken::Single, rest)) => {
                if let Some(child) = self.single.as_mut() {
                    child.remove(rest, id);
                    if child.is_empty() {
                        self.single = None;
                    }
                }
            }
            Some((PatternToken::Literal(literal), rest)) => {
                if let Some(child) = self.literal.get_mut(literal) {
                    child.remove(rest, id);
                    if child.is_empty() {
                        self.literal.remove(literal);
                    }
                }
            }
        }
    }

    fn collect(
        &self,
        tokens: &[&str],
        out: &mut Vec<Arc<SubscriptionCore>>,
    ) {
        let Some((head, rest)) = tokens.split_first() else {
            out.extend(self.exact.iter().cloned());
            return;
        };

        // `>` требует хотя бы один оставшийся токен - он есть.
        out.extend(self.full.iter().cloned());

        if let Some(child) = self.literal.get(*head) {
            child.collect(rest, out);
        }
        if let Some(child) = self.single.as_deref() {
            child.collect(rest, out);
        }
    }

    fn is_empty(&self) -> bool {
        self.exact.is_empty()
            && self.full.is_empty()
            && self.single.is_none()
            && self.literal.is_empty()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

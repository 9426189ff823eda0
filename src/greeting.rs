// Copyright (c) 2025 the replypilot authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

use crate::constants::GREETING_POOL_CAP;

/// Categories of trivial salutation posts that can be answered locally
/// without a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreetingKind {
    Morning,
    Night,
    Afternoon,
    Evening,
    Motivation,
    Casual,
    Crypto,
}

impl GreetingKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Night => "night",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Motivation => "motivation",
            Self::Casual => "casual",
            Self::Crypto => "crypto",
        }
    }
}

/// Case-insensitive whole-word classification against a fixed vocabulary.
/// Returns None for anything that is not a trivial salutation, in which case
/// control always falls through to the generation backend.
pub fn classify(text: &str) -> Option<GreetingKind> {
    static MORNING: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)\b(?:gm|gmgm|good\s+morning|morning\s+frens?|rise\s+and\s+shine)\b")
            .unwrap()
    });
    static NIGHT: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)\b(?:gn|gngn|good\s+night|nighty|sweet\s+dreams)\b").unwrap()
    });
    static AFTERNOON: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\b(?:good\s+afternoon|ga)\b").unwrap());
    static EVENING: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\b(?:good\s+evening|ge)\b").unwrap());
    static MOTIVATION: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?i)\b(?:wagmi|lfg|let'?s\s+go|keep\s+(?:pushing|building|grinding)|stay\s+strong|we\s+got\s+this)\b",
        )
        .unwrap()
    });
    static CRYPTO: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)\b(?:fomo|hodl|dyor|wen|ser|ngmi|gwei|degen|bullish|bearish)\b").unwrap()
    });
    static CASUAL: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\b(?:btw|imo|imho|ngl|tbh|fr|lol|lmao)\b").unwrap());

    if MORNING.is_match(text) {
        Some(GreetingKind::Morning)
    } else if NIGHT.is_match(text) {
        Some(GreetingKind::Night)
    } else if AFTERNOON.is_match(text) {
        Some(GreetingKind::Afternoon)
    } else if EVENING.is_match(text) {
        Some(GreetingKind::Evening)
    } else if MOTIVATION.is_match(text) {
        Some(GreetingKind::Motivation)
    } else if CRYPTO.is_match(text) {
        Some(GreetingKind::Crypto)
    } else if CASUAL.is_match(text) {
        Some(GreetingKind::Casual)
    } else {
        None
    }
}

struct PhraseSet {
    leads: &'static [&'static str],
    tails: &'static [&'static str],
}

const EN_TAILS: &[&str] = &[
    "Have a great one!",
    "Hope your day treats you well.",
    "Let's make it count.",
    "Wishing you all the best today.",
    "Stay awesome.",
    "Enjoy every minute of it.",
    "Make it a good one.",
    "Good vibes all around.",
    "Sending positive energy your way.",
    "Here's to a great day ahead.",
    "Take care out there.",
    "Keep shining.",
];

const UK_TAILS: &[&str] = &[
    "Гарного дня!",
    "Нехай день буде вдалим.",
    "Всього найкращого!",
    "Тримайтесь і не здавайтесь.",
    "Нехай щастить!",
    "Бережіть себе.",
    "Гарного настрою!",
    "Нехай усе вдається.",
    "Успіхів у всьому!",
    "Чудового дня попереду.",
];

const RU_TAILS: &[&str] = &[
    "Хорошего дня!",
    "Пусть день будет удачным.",
    "Всего наилучшего!",
    "Держитесь и не сдавайтесь.",
    "Удачи во всём!",
    "Берегите себя.",
    "Отличного настроения!",
    "Пусть всё получается.",
    "Прекрасного дня впереди.",
    "Успехов сегодня!",
];

fn phrase_set(kind: GreetingKind, lang: &str) -> PhraseSet {
    let (leads, tails): (&[&str], &[&str]) = match (kind, lang) {
        (GreetingKind::Morning, "uk") => (
            &[
                "Доброго ранку!",
                "ГМ!",
                "Гарного ранку!",
                "Доброго ранку, друзі!",
                "Прокидаємось!",
                "Ранок добрий!",
                "З новим днем!",
                "Доброго ранку всім!",
                "Гм-гм!",
                "Вітаю з ранком!",
            ],
            UK_TAILS,
        ),
        (GreetingKind::Morning, "ru") => (
            &[
                "Доброе утро!",
                "ГМ!",
                "С добрым утром!",
                "Доброе утро, друзья!",
                "Просыпаемся!",
                "Утро доброе!",
                "С новым днём!",
                "Всем доброго утра!",
                "Гм-гм!",
                "Привет с утра!",
            ],
            RU_TAILS,
        ),
        (GreetingKind::Morning, _) => (
            &[
                "GM!",
                "Good morning!",
                "Morning, fren!",
                "GM GM!",
                "Rise and shine!",
                "Top of the morning!",
                "Good morning, everyone!",
                "GM, legends!",
                "Morning vibes!",
                "A very good morning to you!",
                "GM from this side of the timeline!",
                "Up and at it!",
            ],
            EN_TAILS,
        ),
        (GreetingKind::Night, "uk") => (
            &[
                "Добраніч!",
                "ГН!",
                "На добраніч!",
                "Солодких снів!",
                "Гарної ночі!",
                "Добраніч усім!",
                "Час відпочивати!",
                "Спокійної ночі!",
            ],
            UK_TAILS,
        ),
        (GreetingKind::Night, "ru") => (
            &[
                "Спокойной ночи!",
                "ГН!",
                "Доброй ночи!",
                "Сладких снов!",
                "Спокойной ночи всем!",
                "Пора отдыхать!",
                "Хорошего сна!",
                "Ночи доброй!",
            ],
            RU_TAILS,
        ),
        (GreetingKind::Night, _) => (
            &[
                "GN!",
                "Good night!",
                "Nighty night!",
                "Sweet dreams!",
                "GN GN!",
                "Sleep well!",
                "Rest up!",
                "Good night, fren!",
                "Lights out for me too!",
                "Time to recharge!",
            ],
            EN_TAILS,
        ),
        (GreetingKind::Afternoon, "uk") => (
            &["Доброго дня!", "Гарного дня!", "Вітаю!", "Добрий день усім!"],
            UK_TAILS,
        ),
        (GreetingKind::Afternoon, "ru") => (
            &["Добрый день!", "Хорошего дня!", "Приветствую!", "Добрый день всем!"],
            RU_TAILS,
        ),
        (GreetingKind::Afternoon, _) => (
            &[
                "Good afternoon!",
                "GA!",
                "Afternoon, fren!",
                "Happy afternoon!",
                "Hope the afternoon is treating you well!",
                "Midday check-in!",
            ],
            EN_TAILS,
        ),
        (GreetingKind::Evening, "uk") => (
            &["Доброго вечора!", "Гарного вечора!", "Вечір добрий!", "Добрий вечір усім!"],
            UK_TAILS,
        ),
        (GreetingKind::Evening, "ru") => (
            &["Добрый вечер!", "Хорошего вечера!", "Вечер добрый!", "Добрый вечер всем!"],
            RU_TAILS,
        ),
        (GreetingKind::Evening, _) => (
            &[
                "Good evening!",
                "GE!",
                "Evening, fren!",
                "Happy evening!",
                "Hope your evening is cozy!",
                "Evening check-in!",
            ],
            EN_TAILS,
        ),
        (GreetingKind::Motivation, "uk") => (
            &[
                "Так тримати!",
                "Вперед!",
                "Не зупиняймось!",
                "Ми зможемо!",
                "Повна віра в це!",
                "Продовжуємо будувати!",
            ],
            UK_TAILS,
        ),
        (GreetingKind::Motivation, "ru") => (
            &[
                "Так держать!",
                "Вперёд!",
                "Не останавливаемся!",
                "Мы справимся!",
                "Полная вера в это!",
                "Продолжаем строить!",
            ],
            RU_TAILS,
        ),
        (GreetingKind::Motivation, _) => (
            &[
                "WAGMI!",
                "LFG!",
                "Keep pushing!",
                "We got this!",
                "Stay strong!",
                "Let's go!",
                "Keep building!",
                "Full conviction!",
                "One day at a time!",
                "Momentum is everything!",
            ],
            EN_TAILS,
        ),
        (GreetingKind::Casual, "uk") => (
            &["Справді так.", "Погоджуюсь.", "Чесно кажучи, так.", "Це точно."],
            UK_TAILS,
        ),
        (GreetingKind::Casual, "ru") => (
            &["И правда так.", "Согласен.", "Честно говоря, да.", "Это точно."],
            RU_TAILS,
        ),
        (GreetingKind::Casual, _) => (
            &[
                "Honestly, same.",
                "Ngl, that's fair.",
                "Tbh I feel this.",
                "Couldn't agree more.",
                "Real talk.",
                "That's a mood.",
                "Felt that.",
                "Facts.",
            ],
            EN_TAILS,
        ),
        (GreetingKind::Crypto, "uk") => (
            &["Тільки вгору!", "HODL!", "DYOR, звісно.", "Тримаємось!"],
            UK_TAILS,
        ),
        (GreetingKind::Crypto, "ru") => (
            &["Только вверх!", "HODL!", "DYOR, конечно.", "Держимся!"],
            RU_TAILS,
        ),
        (GreetingKind::Crypto, _) => (
            &[
                "HODL strong!",
                "DYOR, always.",
                "Wen moon, ser?",
                "Staying bullish!",
                "Zoom out!",
                "Patience pays, ser.",
                "Conviction over FOMO.",
                "Still early!",
            ],
            EN_TAILS,
        ),
    };
    PhraseSet { leads, tails }
}

/// Deterministic lead x tail expansion, capped at `GREETING_POOL_CAP`.
pub fn reply_pool(kind: GreetingKind, lang: &str) -> Vec<String> {
    let set = phrase_set(kind, lang);
    let mut pool = Vec::with_capacity(set.leads.len() * set.tails.len());
    'outer: for lead in set.leads {
        for tail in set.tails {
            if pool.len() >= GREETING_POOL_CAP {
                break 'outer;
            }
            pool.push(format!("{} {}", lead, tail));
        }
    }
    pool
}

/// One canned reply chosen uniformly at random from the pool.
pub fn canned_reply<R: Rng + ?Sized>(kind: GreetingKind, lang: &str, rng: &mut R) -> String {
    let pool = reply_pool(kind, lang);
    let index = rng.gen_range(0..pool.len());
    pool[index].clone()
}

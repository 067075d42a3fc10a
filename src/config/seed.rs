// src/config/seed.rs
//! Built-in keyword table and source list, used when no config file is present.

use std::collections::BTreeMap;

use super::digest::SourceSpec;
use crate::ingest::types::SourceKind;

pub(crate) fn default_keywords() -> BTreeMap<String, i32> {
    let pairs: &[(&str, i32)] = &[
        // model releases & names
        ("gpt", 5),
        ("gpt-4", 5),
        ("gpt-5", 5),
        ("chatgpt", 5),
        ("claude", 5),
        ("gemini", 5),
        ("llama", 5),
        ("mistral", 5),
        ("sora", 5),
        ("veo", 5),
        ("deepseek", 5),
        ("phi", 4),
        ("qwen", 4),
        ("gemma", 4),
        ("stable diffusion", 5),
        ("midjourney", 5),
        ("whisper", 4),
        ("copilot", 4),
        ("dall-e", 5),
        ("flux", 4),
        ("ideogram", 4),
        // video & image generation
        ("video model", 5),
        ("text-to-video", 5),
        ("video generation", 5),
        ("text-to-image", 4),
        ("image generation", 4),
        ("image model", 4),
        // general AI concepts
        ("release", 4),
        ("released", 4),
        ("launch", 4),
        ("launches", 4),
        ("announce", 4),
        ("announcing", 4),
        ("introducing", 4),
        ("open-source", 4),
        ("open source", 4),
        ("breakthrough", 4),
        ("state-of-the-art", 4),
        ("sota", 4),
        ("new model", 5),
        ("benchmark", 3),
        ("multimodal", 4),
        ("agent", 3),
        ("agents", 3),
        ("reasoning", 3),
        ("fine-tune", 3),
        ("fine-tuning", 3),
        ("training", 3),
        ("transformer", 3),
        ("diffusion", 3),
        ("robotics", 3),
        ("self-driving", 3),
        ("autonomous", 3),
        // ecosystem & tools
        ("hugging face", 3),
        ("openai", 4),
        ("anthropic", 4),
        ("deepmind", 4),
        ("google ai", 3),
        ("meta ai", 3),
        ("microsoft ai", 3),
        ("nvidia", 3),
        ("trending", 2),
        ("framework", 2),
        ("library", 2),
        ("api", 2),
        ("sdk", 2),
        ("dataset", 2),
        ("tool", 2),
    ];
    pairs.iter().map(|(k, w)| (k.to_string(), *w)).collect()
}

fn rss(name: &str, url: &str, kind: SourceKind, limit: usize, emoji: &str) -> SourceSpec {
    SourceSpec::Rss {
        name: name.to_string(),
        url: url.to_string(),
        kind,
        limit,
        emoji: Some(emoji.to_string()),
    }
}

fn trending(topic: &str, emoji: &str) -> SourceSpec {
    SourceSpec::GithubTrending {
        topic: topic.to_string(),
        limit: 10,
        emoji: Some(emoji.to_string()),
    }
}

pub(crate) fn default_sources() -> Vec<SourceSpec> {
    use SourceKind::{Community, ResearchBlog};
    vec![
        rss("Hugging Face Blog", "https://hf.co/blog/feed.xml", ResearchBlog, 10, "🤗"),
        rss("Hugging Face Paper", "https://jamesg.blog/hf-papers.xml", ResearchBlog, 10, "📝"),
        rss("ML Reddit", "https://www.reddit.com/r/MachineLearning/.rss", Community, 10, "🤖"),
        rss("OpenAI Blog", "https://openai.com/blog/rss.xml", ResearchBlog, 10, "✨"),
        rss("The Gradient", "https://thegradient.pub/rss/", ResearchBlog, 10, "📜"),
        rss("Jay Alammar", "https://jalammar.github.io/feed.xml", ResearchBlog, 10, "💡"),
        rss("DeepMind Blog", "https://deepmind.google/blog/rss.xml", ResearchBlog, 10, "🔬"),
        rss(
            "AI From MIT News",
            "https://news.mit.edu/rss/topic/artificial-intelligence2",
            ResearchBlog,
            10,
            "🎓",
        ),
        rss("MIT Technology Review", "https://www.technologyreview.com/feed/", ResearchBlog, 10, "🏛️"),
        rss("Microsoft AI Blog", "https://blogs.microsoft.com/ai/feed/", ResearchBlog, 10, "💻"),
        rss(
            "Machine Learning Mastery",
            "https://machinelearningmastery.com/blog/feed/",
            ResearchBlog,
            10,
            "👨‍🏫",
        ),
        rss("Nvidia AI Blog", "https://blogs.nvidia.com/blog/category/ai/feed/", ResearchBlog, 10, "🚀"),
        rss("Towards Data Science", "https://towardsdatascience.com/feed/", Community, 10, "📊"),
        rss("The Verge", "https://www.theverge.com/rss/index.xml", Community, 20, "🟣"),
        trending("python", "🐍"),
        trending("jupyter-notebook", "📓"),
        trending("machine-learning", "📈"),
        trending("deep-learning", "🌌"),
        trending("nlp", "🗣️"),
        SourceSpec::HackerNews {
            limit: 20,
            emoji: Some("🧑‍💻".to_string()),
        },
    ]
}
